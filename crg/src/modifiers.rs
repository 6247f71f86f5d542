//! Scale and reposition modifiers.
//!
//! [`apply_modifiers`] derives an [`EffectiveGeometry`] from the raw
//! [`GridStore`]. It never reads a previous result, so re-applying a
//! different set always starts from the pristine data.

use std::fmt;

use tracing::debug;

use crate::error::{CrgError, Result};
use crate::geometry::{self, EffectiveGeometry};
use crate::options::RefLineContinuation;
use crate::store::{ElevationLine, GridStore, StationPose};

/// Treatment of void (NaN) elevation samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum NanMode {
    /// Leave voids in place; queries touching them return NaN.
    #[default]
    Keep,
    /// Replace voids by zero.
    SetZero,
    /// Replace voids by the preceding valid sample along the lateral line.
    KeepLast,
}

/// Place the path point `(u, v)` at world `(x, y, z)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReferencePoint {
    pub u: f64,
    pub v: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Heading of the reference line at `u`; the current heading is kept when absent.
    #[cfg_attr(feature = "serde", serde(default))]
    pub heading: Option<f64>,
}

/// Rigid motion of the whole reference line: rotation by `dphi` about
/// `(center_x, center_y)`, followed by a translation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RefLineOffset {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    pub dphi: f64,
    pub center_x: f64,
    pub center_y: f64,
}

/// Modifier set; the default is the identity.
///
/// # Example
///
/// ```
/// use crg::{GridStore, Modifiers, apply_modifiers};
///
/// let store = GridStore::builder(1.0, 11).build().unwrap();
/// let modifiers = Modifiers {
///     scale_length: 2.0,
///     ..Modifiers::default()
/// };
///
/// let effective = apply_modifiers(&store, &modifiers).unwrap();
/// assert_eq!(effective.u_range(), (0.0, 20.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Modifiers {
    /// Factor on all elevations.
    pub scale_z: f64,
    /// Factor on the reference elevation change along the line.
    pub scale_slope: f64,
    /// Factor on the cross slope.
    pub scale_bank: f64,
    /// Factor on the reference line curvature; 0 straightens the line.
    pub scale_curvature: f64,
    /// Factor on the station spacing.
    pub scale_length: f64,
    /// Factor on the lateral offsets.
    pub scale_width: f64,
    pub reference_point: Option<ReferencePoint>,
    pub ref_line_offset: Option<RefLineOffset>,
    pub nan_mode: NanMode,
}

impl Default for Modifiers {
    fn default() -> Self {
        Self {
            scale_z: 1.0,
            scale_slope: 1.0,
            scale_bank: 1.0,
            scale_curvature: 1.0,
            scale_length: 1.0,
            scale_width: 1.0,
            reference_point: None,
            ref_line_offset: None,
            nan_mode: NanMode::Keep,
        }
    }
}

impl Modifiers {
    /// Returns true if applying this set leaves the data unchanged.
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    /// Reject values that would produce degenerate geometry.
    ///
    /// # Errors
    ///
    /// Returns [`CrgError::InvalidModifier`] for non-finite values and for
    /// length or width scales that are not positive.
    pub fn validate(&self) -> Result<()> {
        let scales = [
            ("scale_z", self.scale_z),
            ("scale_slope", self.scale_slope),
            ("scale_bank", self.scale_bank),
            ("scale_curvature", self.scale_curvature),
            ("scale_length", self.scale_length),
            ("scale_width", self.scale_width),
        ];
        for (name, value) in scales {
            if !value.is_finite() {
                return Err(invalid(name, value, "must be finite"));
            }
        }
        if self.scale_length <= 0.0 {
            return Err(invalid("scale_length", self.scale_length, "must be positive"));
        }
        if self.scale_width <= 0.0 {
            return Err(invalid("scale_width", self.scale_width, "must be positive"));
        }

        if let Some(p) = &self.reference_point {
            let values = [
                ("reference_point.u", p.u),
                ("reference_point.v", p.v),
                ("reference_point.x", p.x),
                ("reference_point.y", p.y),
                ("reference_point.z", p.z),
                ("reference_point.heading", p.heading.unwrap_or(0.0)),
            ];
            for (name, value) in values {
                if !value.is_finite() {
                    return Err(invalid(name, value, "must be finite"));
                }
            }
        }

        if let Some(o) = &self.ref_line_offset {
            let values = [
                ("ref_line_offset.dx", o.dx),
                ("ref_line_offset.dy", o.dy),
                ("ref_line_offset.dz", o.dz),
                ("ref_line_offset.dphi", o.dphi),
                ("ref_line_offset.center_x", o.center_x),
                ("ref_line_offset.center_y", o.center_y),
            ];
            for (name, value) in values {
                if !value.is_finite() {
                    return Err(invalid(name, value, "must be finite"));
                }
            }
        }

        Ok(())
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_identity() {
            return f.write_str("none");
        }
        let mut parts = Vec::new();
        let scales = [
            ("scale_z", self.scale_z),
            ("scale_slope", self.scale_slope),
            ("scale_bank", self.scale_bank),
            ("scale_curvature", self.scale_curvature),
            ("scale_length", self.scale_length),
            ("scale_width", self.scale_width),
        ];
        for (name, value) in scales {
            if value != 1.0 {
                parts.push(format!("{name}={value}"));
            }
        }
        if let Some(p) = &self.reference_point {
            parts.push(format!(
                "reference_point=({}, {}) -> ({}, {}, {})",
                p.u, p.v, p.x, p.y, p.z
            ));
            if let Some(heading) = p.heading {
                parts.push(format!("reference_heading={heading}"));
            }
        }
        if let Some(o) = &self.ref_line_offset {
            parts.push(format!(
                "ref_line_offset=({}, {}, {}, {}) about ({}, {})",
                o.dx, o.dy, o.dz, o.dphi, o.center_x, o.center_y
            ));
        }
        if self.nan_mode != NanMode::Keep {
            parts.push(format!("nan_mode={:?}", self.nan_mode));
        }
        f.write_str(&parts.join(", "))
    }
}

fn invalid(name: &'static str, value: f64, reason: &'static str) -> CrgError {
    CrgError::InvalidModifier { name, value, reason }
}

/// Derive the effective geometry of `store` under `modifiers`.
///
/// Steps, in order: void policy, curvature scale, length scale, width scale,
/// elevation scales, reference point, rigid offset.
///
/// # Errors
///
/// Returns [`CrgError::InvalidModifier`] if [`Modifiers::validate`] fails.
pub fn apply_modifiers(store: &GridStore, modifiers: &Modifiers) -> Result<EffectiveGeometry> {
    modifiers.validate()?;
    debug!(modifiers = %modifiers, "applying modifiers");

    if modifiers.is_identity() {
        return Ok(EffectiveGeometry::from_store(store));
    }

    let lines: Vec<ElevationLine> = store
        .lines()
        .iter()
        .map(|line| fill_voids(line, modifiers.nan_mode))
        .collect();

    let raw = store.poses();
    let u_increment = store.u_increment() * modifiers.scale_length;
    let u_first = store.u_first() * modifiers.scale_length;

    let mut poses = if modifiers.scale_curvature == 1.0 && modifiers.scale_length == 1.0 {
        raw.to_vec()
    } else {
        let h0 = raw[0].heading;
        let headings: Vec<f64> = raw
            .iter()
            .map(|p| h0 + modifiers.scale_curvature * (p.heading - h0))
            .collect();
        geometry::integrate_headings(raw[0].x, raw[0].y, &headings, u_increment)
    };

    let lateral_offsets: Vec<f64> = store
        .lateral_offsets()
        .iter()
        .map(|v| v * modifiers.scale_width)
        .collect();

    let sz = modifiers.scale_z;
    let ref0 = store.reference_elevation()[0];
    let mut reference_elevation: Vec<f64> = store
        .reference_elevation()
        .iter()
        .map(|z| (ref0 + modifiers.scale_slope * (z - ref0)) * sz)
        .collect();
    let bank_factor = modifiers.scale_bank * sz / modifiers.scale_width;
    let bank: Vec<f64> = store.bank().iter().map(|b| b * bank_factor).collect();
    let lines = if sz == 1.0 {
        lines
    } else {
        lines.iter().map(|line| scale_line(line, sz)).collect()
    };

    if let Some(point) = modifiers.reference_point {
        let staged = EffectiveGeometry {
            u_first,
            u_increment,
            lateral_offsets: lateral_offsets.clone(),
            lines: Vec::new(),
            reference_elevation: reference_elevation.clone(),
            bank: bank.clone(),
            poses: poses.clone(),
        };
        let path = staged.path_point(point.u, RefLineContinuation::Extrapolate)?;
        let (px, py) = path.offset(point.v);

        if let Some(heading) = point.heading {
            rotate(&mut poses, px, py, heading - path.heading);
        }
        translate(&mut poses, point.x - px, point.y - py);

        let dz = point.z - staged.base_elevation(point.u, 0.0);
        reference_elevation.iter_mut().for_each(|z| *z += dz);
    }

    if let Some(offset) = modifiers.ref_line_offset {
        rotate(&mut poses, offset.center_x, offset.center_y, offset.dphi);
        translate(&mut poses, offset.dx, offset.dy);
        reference_elevation.iter_mut().for_each(|z| *z += offset.dz);
    }

    Ok(EffectiveGeometry {
        u_first,
        u_increment,
        lateral_offsets,
        lines,
        reference_elevation,
        bank,
        poses,
    })
}

/// Replace void samples according to `mode`.
fn fill_voids(line: &ElevationLine, mode: NanMode) -> ElevationLine {
    let samples = line.samples();
    if mode == NanMode::Keep || !samples.iter().any(|s| s.is_nan()) {
        return line.clone();
    }

    // Relative sample that yields an absolute value of zero.
    let zero = -line.mean() as f32;

    let filled = match mode {
        NanMode::Keep => samples.to_vec(),
        NanMode::SetZero => samples
            .iter()
            .map(|&s| if s.is_nan() { zero } else { s })
            .collect(),
        NanMode::KeepLast => {
            let mut last = samples.iter().copied().find(|s| !s.is_nan()).unwrap_or(zero);
            samples
                .iter()
                .map(|&s| {
                    if s.is_nan() {
                        last
                    } else {
                        last = s;
                        s
                    }
                })
                .collect()
        }
    };

    ElevationLine::from_parts(line.mean(), filled)
}

fn scale_line(line: &ElevationLine, factor: f64) -> ElevationLine {
    let samples = line
        .samples()
        .iter()
        .map(|&s| (s as f64 * factor) as f32)
        .collect();
    ElevationLine::from_parts(line.mean() * factor, samples)
}

/// Rotate positions about `(cx, cy)` and turn headings by `angle`.
fn rotate(poses: &mut [StationPose], cx: f64, cy: f64, angle: f64) {
    if angle == 0.0 {
        return;
    }
    let (sin, cos) = angle.sin_cos();
    for p in poses {
        let (dx, dy) = (p.x - cx, p.y - cy);
        p.x = cx + dx * cos - dy * sin;
        p.y = cy + dx * sin + dy * cos;
        p.heading += angle;
    }
}

fn translate(poses: &mut [StationPose], dx: f64, dy: f64) {
    for p in poses {
        p.x += dx;
        p.y += dy;
    }
}
