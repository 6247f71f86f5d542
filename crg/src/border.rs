//! Elevation evaluation with border policies and smoothing zones.

use std::f64::consts::PI;

use crate::error::{Axis, CrgError, Result};
use crate::geometry::EffectiveGeometry;
use crate::options::{BorderMode, Options, RefLineContinuation};

/// A query coordinate mapped into the data range of one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct AxisMapping {
    /// Coordinate inside `[min, max]`.
    pub coord: f64,
    /// Elevation added for the period the coordinate was taken from.
    pub z_offset: f64,
    /// Fade factor applied to the elevation, 1 inside the data.
    pub weight: f64,
}

impl AxisMapping {
    fn inside(coord: f64) -> Self {
        Self {
            coord,
            z_offset: 0.0,
            weight: 1.0,
        }
    }
}

/// Map `value` into `[min, max]` according to `mode`.
pub(crate) fn map_axis(
    mode: BorderMode,
    offset: f64,
    value: f64,
    min: f64,
    max: f64,
    axis: Axis,
) -> Result<AxisMapping> {
    let out_of_domain = || CrgError::OutOfDomain {
        axis,
        value,
        min,
        max,
    };

    if !value.is_finite() {
        return Err(out_of_domain());
    }
    if value >= min && value <= max {
        return Ok(AxisMapping::inside(value));
    }

    let length = max - min;
    match mode {
        BorderMode::None => Err(out_of_domain()),
        BorderMode::ExKeep => Ok(AxisMapping::inside(value.clamp(min, max))),
        BorderMode::ExZero => {
            let distance = if value < min { min - value } else { value - max };
            let margin = offset.abs();
            let weight = if margin > 0.0 && distance < margin {
                1.0 - distance / margin
            } else {
                0.0
            };
            Ok(AxisMapping {
                coord: value.clamp(min, max),
                z_offset: 0.0,
                weight,
            })
        }
        BorderMode::Repeat => {
            let period = ((value - min) / length).floor();
            let coord = (value - period * length).clamp(min, max);
            Ok(AxisMapping {
                coord,
                z_offset: period * offset,
                weight: 1.0,
            })
        }
        BorderMode::Reflect => {
            let r = (value - min).rem_euclid(2.0 * length);
            let coord = if r <= length { min + r } else { min + 2.0 * length - r };
            Ok(AxisMapping::inside(coord.clamp(min, max)))
        }
    }
}

/// Elevation at `(u, v)` including border handling and smoothing.
pub(crate) fn elevation(geometry: &EffectiveGeometry, options: &Options, u: f64, v: f64) -> Result<f64> {
    let (u_min, u_max) = geometry.u_range();
    let (v_min, v_max) = geometry.v_range();

    let u = if options.ref_line_continuation == RefLineContinuation::CloseTrack
        && u.is_finite()
        && !geometry.contains_u(u)
    {
        geometry.wrap_u(u)
    } else {
        u
    };

    let mu = map_axis(options.border_mode_u, options.border_offset_u, u, u_min, u_max, Axis::U)?;
    let mv = map_axis(options.border_mode_v, options.border_offset_v, v, v_min, v_max, Axis::V)?;

    if mu.weight == 0.0 || mv.weight == 0.0 {
        return Ok(0.0);
    }

    let z = smoothed_surface(geometry, options, mu.coord, mv.coord);
    Ok((z + mu.z_offset + mv.z_offset) * mu.weight * mv.weight)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Begin,
    End,
}

/// Surface value, blended toward the border target inside the smoothing zones.
fn smoothed_surface(geometry: &EffectiveGeometry, options: &Options, u: f64, v: f64) -> f64 {
    let (u_min, u_max) = geometry.u_range();
    let z = geometry.surface(u, v);

    let zone = if options.smooth_u_begin > 0.0 && u < u_min + options.smooth_u_begin {
        Some((Edge::Begin, (u - u_min) / options.smooth_u_begin))
    } else if options.smooth_u_end > 0.0 && u > u_max - options.smooth_u_end {
        Some((Edge::End, (u_max - u) / options.smooth_u_end))
    } else {
        None
    };

    let Some((edge, s)) = zone else {
        return z;
    };

    let target = border_target(geometry, options, edge, v);
    if z.is_nan() {
        return target;
    }

    let w = ramp(s);
    target + w * (z - target)
}

/// Cosine ramp from 0 at the border to 1 at the inner end of the zone.
#[inline]
fn ramp(s: f64) -> f64 {
    let s = s.clamp(0.0, 1.0);
    0.5 - 0.5 * (PI * s).cos()
}

/// Value the surface approaches at a border.
fn border_target(geometry: &EffectiveGeometry, options: &Options, edge: Edge, v: f64) -> f64 {
    let (u_min, u_max) = geometry.u_range();
    let u_edge = match edge {
        Edge::Begin => u_min,
        Edge::End => u_max,
    };
    let base = geometry.base_elevation(u_edge, v);

    match options.border_mode_u {
        BorderMode::ExZero => 0.0,
        BorderMode::Repeat => {
            let (opposite, shift) = match edge {
                Edge::Begin => (u_max, -options.border_offset_u),
                Edge::End => (u_min, options.border_offset_u),
            };
            let z = geometry.surface(opposite, v);
            if z.is_nan() {
                base
            } else {
                z + shift
            }
        }
        _ => base,
    }
}
