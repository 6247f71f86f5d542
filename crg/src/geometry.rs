//! Reference line geometry of the effective (modified) data.
//!
//! The reference line is a chain of circular arcs: between two stations the
//! heading changes linearly, i.e. the curvature is constant per segment.
//! Station positions are integrated with the exact chord of each arc, and the
//! same formula places points inside a segment, so forward placement always
//! reproduces the stored stations.
//!
//! A point `(u, v)` lies on the normal of the reference line at `u`, `v` to
//! the left. On an arc segment the lines of constant `v` are concentric arcs
//! of radius `1/κ - v`, so the mapping is exactly invertible as long as
//! `1 - κ v > 0`.

use std::f64::consts::{PI, TAU};

use crate::error::{Axis, CrgError, Result};
use crate::options::RefLineContinuation;
use crate::store::{ElevationLine, GridStore, StationPose};

/// Maximum Newton iterations per refinement pass.
const MAX_ITERATIONS: usize = 32;

/// Convergence threshold for the Newton step, relative to `1 + |u|`.
const TOLERANCE: f64 = 1e-10;

/// Smallest accepted value of `1 - κ v`.
const MIN_DENOMINATOR: f64 = 1e-9;

/// Pose of the reference line at an arbitrary position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathPoint {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
    pub curvature: f64,
}

impl PathPoint {
    /// World position at lateral offset `v`.
    #[inline]
    pub fn offset(&self, v: f64) -> (f64, f64) {
        let (sin, cos) = self.heading.sin_cos();
        (self.x - v * sin, self.y + v * cos)
    }

    /// Components of `(x, y) - self` along and across the heading.
    #[inline]
    fn local(&self, x: f64, y: f64) -> (f64, f64) {
        let (sin, cos) = self.heading.sin_cos();
        let (dx, dy) = (x - self.x, y - self.y);
        (dx * cos + dy * sin, dy * cos - dx * sin)
    }
}

/// Result of projecting a world point onto the reference line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Projection {
    pub u: f64,
    pub v: f64,
}

/// Geometry and elevation data that all queries read.
///
/// Produced from a [`GridStore`] either unchanged ([`EffectiveGeometry::from_store`])
/// or through [`apply_modifiers`](crate::modifiers::apply_modifiers).
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveGeometry {
    pub(crate) u_first: f64,
    pub(crate) u_increment: f64,
    pub(crate) lateral_offsets: Vec<f64>,
    pub(crate) lines: Vec<ElevationLine>,
    pub(crate) reference_elevation: Vec<f64>,
    pub(crate) bank: Vec<f64>,
    pub(crate) poses: Vec<StationPose>,
}

impl EffectiveGeometry {
    /// Copy of the raw data without any modification.
    pub fn from_store(store: &GridStore) -> Self {
        Self {
            u_first: store.u_first(),
            u_increment: store.u_increment(),
            lateral_offsets: store.lateral_offsets().to_vec(),
            lines: store.lines().to_vec(),
            reference_elevation: store.reference_elevation().to_vec(),
            bank: store.bank().to_vec(),
            poses: store.poses().to_vec(),
        }
    }

    /// Station spacing.
    pub fn u_increment(&self) -> f64 {
        self.u_increment
    }

    /// Number of stations.
    pub fn station_count(&self) -> usize {
        self.poses.len()
    }

    /// First and last station position.
    pub fn u_range(&self) -> (f64, f64) {
        (self.u_first, self.u_last())
    }

    /// First and last lateral offset.
    pub fn v_range(&self) -> (f64, f64) {
        (
            self.lateral_offsets[0],
            self.lateral_offsets[self.lateral_offsets.len() - 1],
        )
    }

    /// Length of the reference line.
    pub fn track_length(&self) -> f64 {
        self.u_last() - self.u_first
    }

    pub fn lateral_offsets(&self) -> &[f64] {
        &self.lateral_offsets
    }

    pub fn lines(&self) -> &[ElevationLine] {
        &self.lines
    }

    pub fn reference_elevation(&self) -> &[f64] {
        &self.reference_elevation
    }

    pub fn bank(&self) -> &[f64] {
        &self.bank
    }

    pub fn poses(&self) -> &[StationPose] {
        &self.poses
    }

    #[inline]
    fn u_last(&self) -> f64 {
        self.u_first + (self.poses.len() - 1) as f64 * self.u_increment
    }

    #[inline]
    pub(crate) fn contains_u(&self, u: f64) -> bool {
        u >= self.u_first && u <= self.u_last()
    }

    /// Map `u` into `[u_first, u_last)` for a closed track.
    #[inline]
    pub(crate) fn wrap_u(&self, u: f64) -> f64 {
        let length = self.track_length();
        self.u_first + (u - self.u_first).rem_euclid(length)
    }

    /// Segment index and distance from its start station.
    #[inline]
    pub(crate) fn locate(&self, u: f64) -> (usize, f64) {
        let last_segment = self.poses.len() - 2;
        let s = ((u - self.u_first) / self.u_increment).floor().max(0.0);
        let segment = (s as usize).min(last_segment);
        let t = u - (self.u_first + segment as f64 * self.u_increment);
        (segment, t)
    }

    fn segment_point(&self, segment: usize, t: f64) -> PathPoint {
        let p = &self.poses[segment];
        let (x, y) = arc_step(p.x, p.y, p.heading, p.curvature, t);
        PathPoint {
            x,
            y,
            heading: p.heading + p.curvature * t,
            curvature: p.curvature,
        }
    }

    /// Tangent line beyond either end of the reference line.
    fn extrapolated_point(&self, u: f64) -> PathPoint {
        let (pose, s) = if u < self.u_first {
            (&self.poses[0], u - self.u_first)
        } else {
            (&self.poses[self.poses.len() - 1], u - self.u_last())
        };
        let (sin, cos) = pose.heading.sin_cos();
        PathPoint {
            x: pose.x + s * cos,
            y: pose.y + s * sin,
            heading: pose.heading,
            curvature: 0.0,
        }
    }

    /// Reference line pose at `u`, honouring the continuation mode outside the data.
    pub fn path_point(&self, u: f64, continuation: RefLineContinuation) -> Result<PathPoint> {
        if self.contains_u(u) {
            let (segment, t) = self.locate(u);
            return Ok(self.segment_point(segment, t));
        }

        match continuation {
            RefLineContinuation::None => Err(CrgError::OutOfDomain {
                axis: Axis::U,
                value: u,
                min: self.u_first,
                max: self.u_last(),
            }),
            RefLineContinuation::Extrapolate => Ok(self.extrapolated_point(u)),
            RefLineContinuation::CloseTrack => {
                let (segment, t) = self.locate(self.wrap_u(u));
                Ok(self.segment_point(segment, t))
            }
        }
    }

    /// Pose used while searching: the refusing mode still follows the
    /// tangent lines so that the search converges, the caller rejects the
    /// result afterwards.
    fn search_point(&self, u: f64, continuation: RefLineContinuation) -> PathPoint {
        if self.contains_u(u) {
            let (segment, t) = self.locate(u);
            self.segment_point(segment, t)
        } else if continuation == RefLineContinuation::CloseTrack {
            let (segment, t) = self.locate(self.wrap_u(u));
            self.segment_point(segment, t)
        } else {
            self.extrapolated_point(u)
        }
    }

    /// Newton refinement of the foot point of `(x, y)` starting at `u0`.
    ///
    /// Solves `(P - C(u)) · T(u) = 0`; the derivative of the left side is
    /// `-(1 - κ v)`.
    pub(crate) fn refine(
        &self,
        x: f64,
        y: f64,
        u0: f64,
        continuation: RefLineContinuation,
    ) -> Option<Projection> {
        let closed = continuation == RefLineContinuation::CloseTrack;
        let mut u = u0;

        for _ in 0..MAX_ITERATIONS {
            let p = self.search_point(u, continuation);
            let (along, across) = p.local(x, y);
            let denominator = 1.0 - p.curvature * across;
            if !(denominator > MIN_DENOMINATOR) {
                return None;
            }

            let step = along / denominator;
            u += step;
            if closed {
                u = self.wrap_u(u);
            }

            if step.abs() <= TOLERANCE * (1.0 + u.abs()) {
                let p = self.search_point(u, continuation);
                let (_, v) = p.local(x, y);
                if !(1.0 - p.curvature * v > MIN_DENOMINATOR) {
                    return None;
                }
                return Some(Projection { u, v });
            }
        }

        None
    }

    /// Returns true if `v` lies within the lateral range widened by half its
    /// width on both sides.
    #[inline]
    pub(crate) fn near_lateral_range(&self, v: f64) -> bool {
        let (v_min, v_max) = self.v_range();
        let margin = 0.5 * (v_max - v_min);
        v >= v_min - margin && v <= v_max + margin
    }

    /// Start value for [`Self::refine`] from the chord nearest to `(x, y)`.
    pub(crate) fn coarse_start(&self, x: f64, y: f64) -> f64 {
        let mut best_distance = f64::INFINITY;
        let mut best_u = self.u_first;

        for (i, pair) in self.poses.windows(2).enumerate() {
            let (a, b) = (&pair[0], &pair[1]);
            let (dx, dy) = (b.x - a.x, b.y - a.y);
            let length2 = dx * dx + dy * dy;
            let tau = if length2 > 0.0 {
                (((x - a.x) * dx + (y - a.y) * dy) / length2).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let (ex, ey) = (x - a.x - tau * dx, y - a.y - tau * dy);
            let distance = ex * ex + ey * ey;

            if distance < best_distance {
                best_distance = distance;
                best_u = self.u_first + (i as f64 + tau) * self.u_increment;
            }
        }

        best_u
    }

    /// Lateral cell index and fraction for `v` inside the lateral range.
    #[inline]
    fn lateral_cell(&self, v: f64) -> (usize, f64) {
        let offsets = &self.lateral_offsets;
        let j = offsets
            .partition_point(|&o| o <= v)
            .saturating_sub(1)
            .min(offsets.len() - 2);
        let fraction = ((v - offsets[j]) / (offsets[j + 1] - offsets[j])).clamp(0.0, 1.0);
        (j, fraction)
    }

    /// Elevation without grid detail: reference line plus bank.
    pub(crate) fn base_elevation(&self, u: f64, v: f64) -> f64 {
        let (i, t) = self.locate(u);
        let a = (t / self.u_increment).clamp(0.0, 1.0);
        let reference = lerp(self.reference_elevation[i], self.reference_elevation[i + 1], a);
        let bank = lerp(self.bank[i], self.bank[i + 1], a);
        reference + bank * v
    }

    /// Bilinear surface elevation for `(u, v)` inside the data range.
    pub(crate) fn surface(&self, u: f64, v: f64) -> f64 {
        let (i, t) = self.locate(u);
        let a = (t / self.u_increment).clamp(0.0, 1.0);
        let (j, b) = self.lateral_cell(v);

        let corners = [
            ((1.0 - a) * (1.0 - b), i, j),
            (a * (1.0 - b), i + 1, j),
            ((1.0 - a) * b, i, j + 1),
            (a * b, i + 1, j + 1),
        ];

        // Zero weights are skipped so that void samples on the far side of a
        // cell do not leak into exact grid positions.
        let grid: f64 = corners
            .iter()
            .filter(|(w, _, _)| *w != 0.0)
            .map(|&(w, station, lateral)| w * self.lines[lateral].value(station))
            .sum();

        grid + self.base_elevation(u, v)
    }
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[inline]
fn sinc(a: f64) -> f64 {
    if a.abs() < 1e-6 {
        1.0 - a * a / 6.0
    } else {
        a.sin() / a
    }
}

/// Advance along a circular arc of the given curvature by arc length `s`.
#[inline]
pub(crate) fn arc_step(x: f64, y: f64, heading: f64, curvature: f64, s: f64) -> (f64, f64) {
    let half = 0.5 * curvature * s;
    let chord = s * sinc(half);
    let (sin, cos) = (heading + half).sin_cos();
    (x + chord * cos, y + chord * sin)
}

/// Wrap an angle into `[-π, π)`.
#[inline]
pub(crate) fn wrap_angle(angle: f64) -> f64 {
    (angle + PI).rem_euclid(TAU) - PI
}

/// Remove 2π jumps between consecutive headings.
pub(crate) fn unwrap_headings(headings: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(headings.len());
    let mut previous = match headings.first() {
        Some(&h) => h,
        None => return out,
    };
    let mut accumulated = previous;
    out.push(accumulated);

    for &h in &headings[1..] {
        accumulated += wrap_angle(h - previous);
        previous = h;
        out.push(accumulated);
    }
    out
}

/// Headings from per-station curvature (trapezoidal rule).
pub(crate) fn integrate_curvatures(heading: f64, curvatures: &[f64], du: f64) -> Vec<f64> {
    let mut headings = Vec::with_capacity(curvatures.len());
    let mut h = heading;
    headings.push(h);
    for pair in curvatures.windows(2) {
        h += 0.5 * du * (pair[0] + pair[1]);
        headings.push(h);
    }
    headings
}

/// Station poses from headings, integrating the arc of every segment.
pub(crate) fn integrate_headings(x0: f64, y0: f64, headings: &[f64], du: f64) -> Vec<StationPose> {
    let n = headings.len();
    let mut poses = Vec::with_capacity(n);
    let (mut x, mut y) = (x0, y0);

    for i in 0..n {
        let curvature = if i + 1 < n {
            (headings[i + 1] - headings[i]) / du
        } else if n >= 2 {
            (headings[n - 1] - headings[n - 2]) / du
        } else {
            0.0
        };

        poses.push(StationPose {
            x,
            y,
            heading: headings[i],
            curvature,
        });

        if i + 1 < n {
            (x, y) = arc_step(x, y, headings[i], curvature, du);
        }
    }

    poses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::GridStore;
    use std::f64::consts::FRAC_PI_2;

    fn circle(radius: f64, n: usize) -> EffectiveGeometry {
        let du = FRAC_PI_2 * radius / (n - 1) as f64;
        let store = GridStore::builder(du, n)
            .lateral_offsets(vec![-3.0, 0.0, 3.0])
            .curvatures(0.0, 0.0, 0.0, vec![1.0 / radius; n])
            .build()
            .unwrap();
        EffectiveGeometry::from_store(&store)
    }

    #[test]
    fn test_arc_step_matches_circle() {
        let (x, y) = arc_step(0.0, 0.0, 0.0, 0.1, FRAC_PI_2 * 10.0);
        assert!((x - 10.0).abs() < 1e-12);
        assert!((y - 10.0).abs() < 1e-12);

        let (x, y) = arc_step(1.0, 2.0, FRAC_PI_2, 0.0, 3.0);
        assert!((x - 1.0).abs() < 1e-12);
        assert!((y - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_unwrap_headings() {
        let unwrapped = unwrap_headings(&[3.0, -3.0, -2.9]);
        assert!((unwrapped[1] - (TAU - 3.0)).abs() < 1e-12);
        assert!((unwrapped[2] - (TAU - 2.9)).abs() < 1e-12);
    }

    #[test]
    fn test_path_point_reproduces_stations() {
        let g = circle(40.0, 31);
        for (i, pose) in g.poses().iter().enumerate() {
            let u = i as f64 * g.u_increment();
            let p = g.path_point(u, RefLineContinuation::None).unwrap();
            assert!((p.x - pose.x).abs() < 1e-9);
            assert!((p.y - pose.y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_offset_lies_on_concentric_arc() {
        let g = circle(40.0, 31);
        let center = (0.0, 40.0);
        for k in 0..20 {
            let u = k as f64 * 3.0;
            let p = g.path_point(u, RefLineContinuation::None).unwrap();
            let (x, y) = p.offset(2.5);
            let r = ((x - center.0).powi(2) + (y - center.1).powi(2)).sqrt();
            assert!((r - 37.5).abs() < 1e-9, "radius {} at u {}", r, u);
        }
    }

    #[test]
    fn test_continuation_modes() {
        let g = circle(40.0, 31);
        let (_, last) = g.u_range();

        assert!(g.path_point(last + 1.0, RefLineContinuation::None).is_err());

        let end = g.poses()[30];
        let p = g.path_point(last + 2.0, RefLineContinuation::Extrapolate).unwrap();
        assert!((p.x - end.x).abs() < 1e-9);
        assert!((p.y - (end.y + 2.0)).abs() < 1e-9);
        assert_eq!(p.curvature, 0.0);

        let p = g.path_point(last + 2.0, RefLineContinuation::CloseTrack).unwrap();
        let q = g.path_point(2.0, RefLineContinuation::None).unwrap();
        assert!((p.x - q.x).abs() < 1e-9);
        assert!((p.y - q.y).abs() < 1e-9);
    }

    #[test]
    fn test_refine_inverts_offset() {
        let g = circle(40.0, 31);
        let p = g.path_point(17.3, RefLineContinuation::None).unwrap();
        let (x, y) = p.offset(-2.25);

        let projection = g.refine(x, y, 5.0, RefLineContinuation::None).unwrap();
        assert!((projection.u - 17.3).abs() < 1e-9);
        assert!((projection.v + 2.25).abs() < 1e-9);

        let start = g.coarse_start(x, y);
        assert!((start - 17.3).abs() < g.u_increment());
    }

    #[test]
    fn test_refine_rejects_curvature_centre_side() {
        let g = circle(40.0, 31);
        // Beyond the curvature centre of the arc.
        assert!(g.refine(10.0, 60.0, 30.0, RefLineContinuation::None).is_none());
    }

    #[test]
    fn test_surface_non_uniform_lateral() {
        let store = GridStore::builder(1.0, 3)
            .lateral_offsets(vec![0.0, 1.0, 4.0])
            .elevation_grid(vec![
                vec![0.0, 1.0, 4.0],
                vec![0.0, 1.0, 4.0],
                vec![2.0, 3.0, 6.0],
            ])
            .build()
            .unwrap();
        let g = EffectiveGeometry::from_store(&store);

        assert!((g.surface(0.5, 2.5) - 2.5).abs() < 1e-6);
        assert!((g.surface(1.5, 0.5) - 1.5).abs() < 1e-6);
        assert!((g.surface(2.0, 4.0) - 6.0).abs() < 1e-6);
    }
}
