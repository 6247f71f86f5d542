//! Error types for the CRG library.

use thiserror::Error;

/// Axis of the road grid a coordinate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Longitudinal (station) axis.
    U,
    /// Lateral (offset) axis.
    V,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::U => f.write_str("u"),
            Axis::V => f.write_str("v"),
        }
    }
}

/// Errors that can occur when building, modifying or evaluating CRG data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CrgError {
    /// A query coordinate lies outside the grid and the active border mode refuses it.
    #[error("{axis} = {value} is outside the data range [{min}, {max}]")]
    OutOfDomain {
        axis: Axis,
        value: f64,
        min: f64,
        max: f64,
    },

    /// The inverse transform found no projection onto the reference line.
    #[error("no projection onto the reference line found for x/y = {x} / {y}")]
    NoConvergence { x: f64, y: f64 },

    /// The lateral line at `v` passes through the curvature centre of the reference line.
    #[error("lateral line v = {v} is degenerate at u = {u} (curvature {curvature})")]
    DegenerateCurvature { u: f64, v: f64, curvature: f64 },

    /// Structurally inconsistent grid data, rejected by the check step.
    #[error("invalid grid data: {0}")]
    InvalidData(String),

    /// A modifier value that would produce degenerate geometry.
    #[error("invalid modifier {name} = {value}: {reason}")]
    InvalidModifier {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// Handle does not refer to a loaded data set.
    #[error("unknown or released data set: {id}")]
    UnknownDataSet { id: u64 },

    /// The registry already holds its maximum number of data sets.
    #[error("registry is full ({capacity} data sets)")]
    RegistryFull { capacity: u64 },

    /// A textual option value could not be parsed.
    #[error("invalid value {value:?} for option {option}")]
    InvalidOption { option: &'static str, value: String },
}

/// Result type alias using [`CrgError`].
pub type Result<T> = std::result::Result<T, CrgError>;
