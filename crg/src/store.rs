//! Raw road grid storage and the structural check step.
//!
//! This module provides [`GridStore`], the immutable raw data of one road
//! surface: a reference line sampled at uniform stations (the `u` axis), a
//! set of strictly increasing lateral offsets (the `v` axis) and an elevation
//! grid defined relative to that reference line.
//!
//! A store is only ever created through [`GridStoreBuilder`], which validates
//! the structure and derives the reference line poses once. Nothing mutates a
//! store afterwards; modifiers derive a separate
//! [`EffectiveGeometry`](crate::geometry::EffectiveGeometry) from it.

use crate::error::{CrgError, Result};
use crate::geometry;

/// Minimum number of stations along the reference line.
const MIN_STATIONS: usize = 2;

/// Minimum number of lateral lines.
const MIN_LATERAL_LINES: usize = 2;

/// World placement of the reference line at one station.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StationPose {
    /// World x position.
    pub x: f64,
    /// World y position.
    pub y: f64,
    /// Heading in radians, unwrapped along the line.
    pub heading: f64,
    /// Curvature of the segment starting at this station (the last station
    /// repeats the curvature of the last segment).
    pub curvature: f64,
}

/// Elevation samples along one lateral line.
///
/// Samples are kept in single precision relative to a double precision mean,
/// so that large absolute heights keep their resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationLine {
    mean: f64,
    samples: Vec<f32>,
}

impl ElevationLine {
    /// Create a line from absolute elevations. NaN marks void samples.
    pub fn from_values(values: &[f64]) -> Self {
        let (sum, count) = values
            .iter()
            .filter(|v| v.is_finite())
            .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
        let mean = if count == 0 { 0.0 } else { sum / count as f64 };

        Self {
            mean,
            samples: values.iter().map(|v| (v - mean) as f32).collect(),
        }
    }

    pub(crate) fn from_parts(mean: f64, samples: Vec<f32>) -> Self {
        Self { mean, samples }
    }

    /// Mean elevation of the line.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Samples relative to [`Self::mean`].
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Absolute elevation at a station index.
    #[inline]
    pub fn value(&self, station: usize) -> f64 {
        self.mean + self.samples[station] as f64
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the line holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// How the builder receives the reference line.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceLine {
    /// Heading at every station, integrated into positions.
    Headings {
        x: f64,
        y: f64,
        headings: Vec<f64>,
    },
    /// Curvature at every station plus the start heading; headings follow by
    /// trapezoidal integration.
    Curvatures {
        x: f64,
        y: f64,
        heading: f64,
        curvatures: Vec<f64>,
    },
}

/// Immutable raw CRG data.
///
/// # Example
///
/// ```
/// use crg::GridStore;
///
/// let store = GridStore::builder(0.5, 21)
///     .lateral_offsets(vec![-2.0, 0.0, 2.0])
///     .elevation_fn(|u, v| 0.01 * u + 0.1 * v)
///     .build()
///     .unwrap();
///
/// assert_eq!(store.station_count(), 21);
/// assert_eq!(store.u_range(), (0.0, 10.0));
/// ```
#[derive(Debug, Clone)]
pub struct GridStore {
    u_first: f64,
    u_increment: f64,
    lateral_offsets: Vec<f64>,
    lines: Vec<ElevationLine>,
    reference_elevation: Vec<f64>,
    bank: Vec<f64>,
    poses: Vec<StationPose>,
}

impl GridStore {
    /// Start building a store with `station_count` stations spaced `u_increment` apart.
    pub fn builder(u_increment: f64, station_count: usize) -> GridStoreBuilder {
        GridStoreBuilder::new(u_increment, station_count)
    }

    /// Position of the first station along the reference line.
    pub fn u_first(&self) -> f64 {
        self.u_first
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
        let last = self.u_first + (self.station_count() - 1) as f64 * self.u_increment;
        (self.u_first, last)
    }

    /// First and last lateral offset.
    pub fn v_range(&self) -> (f64, f64) {
        (
            self.lateral_offsets[0],
            self.lateral_offsets[self.lateral_offsets.len() - 1],
        )
    }

    /// Lateral offsets of the grid lines.
    pub fn lateral_offsets(&self) -> &[f64] {
        &self.lateral_offsets
    }

    /// Elevation grid, one entry per lateral offset.
    pub fn lines(&self) -> &[ElevationLine] {
        &self.lines
    }

    /// Elevation of the reference line itself at every station.
    pub fn reference_elevation(&self) -> &[f64] {
        &self.reference_elevation
    }

    /// Cross slope at every station.
    pub fn bank(&self) -> &[f64] {
        &self.bank
    }

    /// Reference line pose at every station.
    pub fn poses(&self) -> &[StationPose] {
        &self.poses
    }

    /// Absolute grid value at a station / lateral index, excluding the
    /// reference elevation and bank.
    pub fn grid_value(&self, station: usize, lateral: usize) -> f64 {
        self.lines[lateral].value(station)
    }
}

/// Builder for [`GridStore`]; `build` performs the structural check.
#[derive(Debug, Clone)]
pub struct GridStoreBuilder {
    u_first: f64,
    u_increment: f64,
    station_count: usize,
    lateral_offsets: Vec<f64>,
    elevation: Option<Vec<Vec<f64>>>,
    reference_elevation: Option<Vec<f64>>,
    bank: Option<Vec<f64>>,
    reference_line: Option<ReferenceLine>,
}

impl GridStoreBuilder {
    /// Create a builder for a straight, flat road of the given stationing.
    pub fn new(u_increment: f64, station_count: usize) -> Self {
        Self {
            u_first: 0.0,
            u_increment,
            station_count,
            lateral_offsets: vec![-1.0, 1.0],
            elevation: None,
            reference_elevation: None,
            bank: None,
            reference_line: None,
        }
    }

    /// Set the position of the first station (default 0).
    pub fn u_first(mut self, u_first: f64) -> Self {
        self.u_first = u_first;
        self
    }

    /// Set the lateral offsets; they must be strictly increasing.
    pub fn lateral_offsets(mut self, offsets: Vec<f64>) -> Self {
        self.lateral_offsets = offsets;
        self
    }

    /// Set the elevation grid as `rows[station][lateral]`.
    pub fn elevation_grid(mut self, rows: Vec<Vec<f64>>) -> Self {
        self.elevation = Some(rows);
        self
    }

    /// Fill the elevation grid from a function of `(u, v)`.
    pub fn elevation_fn(mut self, f: impl Fn(f64, f64) -> f64) -> Self {
        let rows = (0..self.station_count)
            .map(|i| {
                let u = self.u_first + i as f64 * self.u_increment;
                self.lateral_offsets.iter().map(|&v| f(u, v)).collect()
            })
            .collect();
        self.elevation = Some(rows);
        self
    }

    /// Set the reference line elevation per station (default 0).
    pub fn reference_elevation(mut self, values: Vec<f64>) -> Self {
        self.reference_elevation = Some(values);
        self
    }

    /// Set the cross slope per station (default 0).
    pub fn bank(mut self, values: Vec<f64>) -> Self {
        self.bank = Some(values);
        self
    }

    /// Define the reference line by its heading at every station.
    pub fn headings(mut self, x: f64, y: f64, headings: Vec<f64>) -> Self {
        self.reference_line = Some(ReferenceLine::Headings { x, y, headings });
        self
    }

    /// Define the reference line by its curvature at every station.
    pub fn curvatures(mut self, x: f64, y: f64, heading: f64, curvatures: Vec<f64>) -> Self {
        self.reference_line = Some(ReferenceLine::Curvatures {
            x,
            y,
            heading,
            curvatures,
        });
        self
    }

    /// Validate the data and build the [`GridStore`].
    ///
    /// # Errors
    ///
    /// Returns [`CrgError::InvalidData`] if:
    /// - the station increment is not positive or fewer than 2 stations are given
    /// - the lateral offsets are not finite and strictly increasing
    /// - any per-station channel does not match the station count
    /// - the reference line contains non-finite values
    pub fn build(self) -> Result<GridStore> {
        let n = self.station_count;

        if !(self.u_increment.is_finite() && self.u_increment > 0.0) {
            return Err(invalid(format!(
                "station increment must be positive, got {}",
                self.u_increment
            )));
        }
        if !self.u_first.is_finite() {
            return Err(invalid(format!("first station {} is not finite", self.u_first)));
        }
        if n < MIN_STATIONS {
            return Err(invalid(format!(
                "at least {MIN_STATIONS} stations required, got {n}"
            )));
        }
        check_lateral_offsets(&self.lateral_offsets)?;

        let n_v = self.lateral_offsets.len();
        let lines = match self.elevation {
            Some(rows) => {
                check_len("elevation grid", n, rows.len())?;
                for row in &rows {
                    check_len("elevation row", n_v, row.len())?;
                }
                (0..n_v)
                    .map(|j| {
                        let column: Vec<f64> = rows.iter().map(|row| row[j]).collect();
                        ElevationLine::from_values(&column)
                    })
                    .collect()
            }
            None => vec![ElevationLine::from_values(&vec![0.0; n]); n_v],
        };

        let reference_elevation = channel("reference elevation", n, self.reference_elevation)?;
        let bank = channel("bank", n, self.bank)?;

        let (x, y, headings) = match self.reference_line {
            None => (0.0, 0.0, vec![0.0; n]),
            Some(ReferenceLine::Headings { x, y, headings }) => {
                check_len("headings", n, headings.len())?;
                (x, y, geometry::unwrap_headings(&headings))
            }
            Some(ReferenceLine::Curvatures {
                x,
                y,
                heading,
                curvatures,
            }) => {
                check_len("curvatures", n, curvatures.len())?;
                let headings = geometry::integrate_curvatures(heading, &curvatures, self.u_increment);
                (x, y, headings)
            }
        };

        if !(x.is_finite() && y.is_finite()) || headings.iter().any(|h| !h.is_finite()) {
            return Err(invalid("reference line contains non-finite values".to_string()));
        }

        let poses = geometry::integrate_headings(x, y, &headings, self.u_increment);

        Ok(GridStore {
            u_first: self.u_first,
            u_increment: self.u_increment,
            lateral_offsets: self.lateral_offsets,
            lines,
            reference_elevation,
            bank,
            poses,
        })
    }
}

fn invalid(message: String) -> CrgError {
    CrgError::InvalidData(message)
}

fn check_len(name: &str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(invalid(format!(
            "{name} has {found} entries, expected {expected}"
        )));
    }
    Ok(())
}

fn check_lateral_offsets(offsets: &[f64]) -> Result<()> {
    if offsets.len() < MIN_LATERAL_LINES {
        return Err(invalid(format!(
            "at least {MIN_LATERAL_LINES} lateral offsets required, got {}",
            offsets.len()
        )));
    }
    if let Some(v) = offsets.iter().find(|v| !v.is_finite()) {
        return Err(invalid(format!("lateral offset {v} is not finite")));
    }
    if let Some(i) = offsets.windows(2).position(|w| w[1] <= w[0]) {
        return Err(invalid(format!(
            "lateral offsets must be strictly increasing (index {})",
            i + 1
        )));
    }
    Ok(())
}

fn channel(name: &str, n: usize, values: Option<Vec<f64>>) -> Result<Vec<f64>> {
    match values {
        Some(values) => {
            check_len(name, n, values.len())?;
            if values.iter().any(|v| !v.is_finite()) {
                return Err(invalid(format!("{name} contains non-finite values")));
            }
            Ok(values)
        }
        None => Ok(vec![0.0; n]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_build_flat_straight() {
        let store = GridStore::builder(1.0, 11).build().unwrap();

        assert_eq!(store.station_count(), 11);
        assert_eq!(store.u_range(), (0.0, 10.0));
        assert_eq!(store.v_range(), (-1.0, 1.0));

        let last = store.poses()[10];
        assert!((last.x - 10.0).abs() < 1e-12);
        assert!(last.y.abs() < 1e-12);
        assert_eq!(last.curvature, 0.0);
    }

    #[test]
    fn test_elevation_mean_keeps_precision() {
        let store = GridStore::builder(1.0, 3)
            .lateral_offsets(vec![0.0, 1.0])
            .elevation_grid(vec![
                vec![1000.001, 5.0],
                vec![1000.002, 5.0],
                vec![1000.003, 5.0],
            ])
            .build()
            .unwrap();

        assert!((store.lines()[0].mean() - 1000.002).abs() < 1e-9);
        assert!((store.grid_value(0, 0) - 1000.001).abs() < 1e-6);
        assert!((store.grid_value(2, 0) - 1000.003).abs() < 1e-6);
    }

    #[test]
    fn test_quarter_circle_from_curvature() {
        let radius = 50.0;
        let n = 101;
        let du = FRAC_PI_2 * radius / (n - 1) as f64;
        let store = GridStore::builder(du, n)
            .curvatures(0.0, 0.0, 0.0, vec![1.0 / radius; n])
            .build()
            .unwrap();

        let end = store.poses()[n - 1];
        assert!((end.x - radius).abs() < 1e-9);
        assert!((end.y - radius).abs() < 1e-9);
        assert!((end.heading - FRAC_PI_2).abs() < 1e-12);
        assert!((end.curvature - 1.0 / radius).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_increment() {
        let result = GridStore::builder(0.0, 10).build();
        assert!(matches!(result, Err(CrgError::InvalidData(_))));

        let result = GridStore::builder(-1.0, 10).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_non_increasing_offsets() {
        let result = GridStore::builder(1.0, 10)
            .lateral_offsets(vec![-1.0, 0.0, 0.0, 1.0])
            .build();

        match result {
            Err(CrgError::InvalidData(msg)) => assert!(msg.contains("strictly increasing")),
            other => panic!("Expected InvalidData error, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_dimension_mismatch() {
        let result = GridStore::builder(1.0, 3)
            .lateral_offsets(vec![0.0, 1.0])
            .elevation_grid(vec![vec![0.0, 0.0], vec![0.0]])
            .build();
        assert!(result.is_err());

        let result = GridStore::builder(1.0, 3)
            .reference_elevation(vec![0.0; 4])
            .build();
        assert!(result.is_err());

        let result = GridStore::builder(1.0, 3)
            .headings(0.0, 0.0, vec![0.0; 2])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_too_few_stations() {
        assert!(GridStore::builder(1.0, 1).build().is_err());
    }

    #[test]
    fn test_nan_samples_allowed() {
        let store = GridStore::builder(1.0, 3)
            .lateral_offsets(vec![0.0, 1.0])
            .elevation_grid(vec![vec![1.0, 2.0], vec![f64::NAN, 2.0], vec![3.0, 2.0]])
            .build()
            .unwrap();

        assert!((store.lines()[0].mean() - 2.0).abs() < 1e-12);
        assert!(store.grid_value(1, 0).is_nan());
    }
}
