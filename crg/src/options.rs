//! Per contact point evaluation options.
//!
//! Options decide how queries behave outside the sampled domain and which
//! curvature is reported. They are small closed sets of variants, selected
//! once per query.

use std::fmt;
use std::str::FromStr;

use crate::error::{CrgError, Result};

/// Policy for elevation queries beyond the data along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum BorderMode {
    /// Fail with [`CrgError::OutOfDomain`].
    None,
    /// Zero elevation, blended linearly over the border offset.
    ExZero,
    /// Keep the value at the border.
    #[default]
    ExKeep,
    /// Tile the data periodically, adding the border offset per period.
    Repeat,
    /// Mirror the data at each border.
    Reflect,
}

impl BorderMode {
    fn as_str(&self) -> &'static str {
        match self {
            BorderMode::None => "none",
            BorderMode::ExZero => "ex-zero",
            BorderMode::ExKeep => "ex-keep",
            BorderMode::Repeat => "repeat",
            BorderMode::Reflect => "reflect",
        }
    }
}

impl fmt::Display for BorderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BorderMode {
    type Err = CrgError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" | "off" => Ok(BorderMode::None),
            "ex-zero" | "exzero" | "zero" => Ok(BorderMode::ExZero),
            "ex-keep" | "exkeep" | "keep" => Ok(BorderMode::ExKeep),
            "repeat" => Ok(BorderMode::Repeat),
            "reflect" => Ok(BorderMode::Reflect),
            _ => Err(CrgError::InvalidOption {
                option: "border mode",
                value: s.to_string(),
            }),
        }
    }
}

/// Which curvature [`heading_and_curvature`](crate::ContactPoint::heading_and_curvature) reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum CurvatureMode {
    /// Curvature of the reference line.
    RefLine,
    /// Curvature of the lateral line through the query point.
    #[default]
    LateralLine,
}

impl fmt::Display for CurvatureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurvatureMode::RefLine => f.write_str("ref-line"),
            CurvatureMode::LateralLine => f.write_str("lateral-line"),
        }
    }
}

impl FromStr for CurvatureMode {
    type Err = CrgError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ref-line" | "refline" | "reference" => Ok(CurvatureMode::RefLine),
            "lateral-line" | "lateralline" | "lateral" => Ok(CurvatureMode::LateralLine),
            _ => Err(CrgError::InvalidOption {
                option: "curvature mode",
                value: s.to_string(),
            }),
        }
    }
}

/// How the reference line continues beyond its first and last station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum RefLineContinuation {
    /// No continuation; positions outside fail.
    None,
    /// Straight tangent lines from the end poses.
    #[default]
    Extrapolate,
    /// The line is a closed loop.
    CloseTrack,
}

impl fmt::Display for RefLineContinuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefLineContinuation::None => f.write_str("none"),
            RefLineContinuation::Extrapolate => f.write_str("extrapolate"),
            RefLineContinuation::CloseTrack => f.write_str("close-track"),
        }
    }
}

impl FromStr for RefLineContinuation {
    type Err = CrgError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" | "off" => Ok(RefLineContinuation::None),
            "extrapolate" => Ok(RefLineContinuation::Extrapolate),
            "close-track" | "closetrack" | "closed" | "loop" => Ok(RefLineContinuation::CloseTrack),
            _ => Err(CrgError::InvalidOption {
                option: "reference line continuation",
                value: s.to_string(),
            }),
        }
    }
}

/// Option record of a [`ContactPoint`](crate::ContactPoint).
///
/// # Example
///
/// ```
/// use crg::{BorderMode, Options};
///
/// let options = Options {
///     border_mode_u: BorderMode::Repeat,
///     border_offset_u: 0.5,
///     ..Options::default()
/// };
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Options {
    pub border_mode_u: BorderMode,
    pub border_mode_v: BorderMode,
    /// Margin for [`BorderMode::ExZero`], per period offset for [`BorderMode::Repeat`].
    pub border_offset_u: f64,
    pub border_offset_v: f64,
    /// Length of the smoothing zone after the first station.
    pub smooth_u_begin: f64,
    /// Length of the smoothing zone before the last station.
    pub smooth_u_end: f64,
    pub curvature_mode: CurvatureMode,
    pub ref_line_continuation: RefLineContinuation,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            border_mode_u: BorderMode::ExKeep,
            border_mode_v: BorderMode::ExKeep,
            border_offset_u: 0.0,
            border_offset_v: 0.0,
            smooth_u_begin: 0.0,
            smooth_u_end: 0.0,
            curvature_mode: CurvatureMode::LateralLine,
            ref_line_continuation: RefLineContinuation::Extrapolate,
        }
    }
}

impl Options {
    /// Check that the numeric options are usable.
    ///
    /// # Errors
    ///
    /// Returns [`CrgError::InvalidOption`] for non-finite offsets or negative
    /// smoothing lengths.
    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("border offset u", self.border_offset_u),
            ("border offset v", self.border_offset_v),
        ];
        for (option, value) in finite {
            if !value.is_finite() {
                return Err(CrgError::InvalidOption {
                    option,
                    value: value.to_string(),
                });
            }
        }

        let lengths = [
            ("smooth u begin", self.smooth_u_begin),
            ("smooth u end", self.smooth_u_end),
        ];
        for (option, value) in lengths {
            if !(value.is_finite() && value >= 0.0) {
                return Err(CrgError::InvalidOption {
                    option,
                    value: value.to_string(),
                });
            }
        }

        Ok(())
    }
}

impl fmt::Display for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "border mode u:          {}", self.border_mode_u)?;
        writeln!(f, "border mode v:          {}", self.border_mode_v)?;
        writeln!(f, "border offset u:        {}", self.border_offset_u)?;
        writeln!(f, "border offset v:        {}", self.border_offset_v)?;
        writeln!(f, "smooth u begin:         {}", self.smooth_u_begin)?;
        writeln!(f, "smooth u end:           {}", self.smooth_u_end)?;
        writeln!(f, "curvature mode:         {}", self.curvature_mode)?;
        write!(f, "ref line continuation:  {}", self.ref_line_continuation)
    }
}
