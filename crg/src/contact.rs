//! Contact points: stateful evaluation cursors.
//!
//! A [`ContactPoint`] reads one data set's effective geometry through a shared
//! handle and keeps its own options, inverse lookup cache and counters. Create
//! one per logical cursor (for example one per wheel); contact points never
//! share state with each other.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::border;
use crate::dataset::{DataSet, DataSetId};
use crate::error::{Axis, CrgError, Result};
use crate::geometry::{self, EffectiveGeometry};
use crate::options::{CurvatureMode, Options, RefLineContinuation};

/// Smallest accepted value of `1 - κ v` for lateral line curvature.
const MIN_LATERAL_FACTOR: f64 = 1e-9;

/// Last successful inverse lookup.
///
/// Stations are equally spaced, so the segment follows from `u` directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedSolution {
    pub u: f64,
}

/// Query counters of one contact point.
///
/// Counters always run; elapsed time is only measured while enabled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerfStats {
    /// Whether query time is being measured.
    pub enabled: bool,
    /// Number of queries issued.
    pub queries: u64,
    /// Number of inverse (x/y to u/v) lookups, including those inside elevation queries.
    pub inverse_queries: u64,
    /// Inverse lookups solved from the cached solution.
    pub cache_hits: u64,
    /// Inverse lookups that needed the coarse scan.
    pub scan_fallbacks: u64,
    /// Queries that returned an error.
    pub failures: u64,
    /// Time spent in queries while enabled.
    pub elapsed: Duration,
}

impl PerfStats {
    /// Share of inverse lookups served from the cache (0.0 to 1.0).
    ///
    /// Returns 0.0 if no inverse lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        if self.inverse_queries == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.inverse_queries as f64
        }
    }

    /// Mean time per query while enabled.
    pub fn time_per_query(&self) -> Duration {
        if self.queries == 0 {
            Duration::ZERO
        } else {
            self.elapsed.div_f64(self.queries as f64)
        }
    }
}

impl fmt::Display for PerfStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "queries:          {}", self.queries)?;
        writeln!(f, "failures:         {}", self.failures)?;
        writeln!(f, "inverse lookups:  {}", self.inverse_queries)?;
        writeln!(
            f,
            "cache hits:       {} ({:.1}%)",
            self.cache_hits,
            self.hit_rate() * 100.0
        )?;
        writeln!(f, "scan fallbacks:   {}", self.scan_fallbacks)?;
        if self.enabled {
            write!(
                f,
                "elapsed:          {:.3?} ({:.3?} per query)",
                self.elapsed,
                self.time_per_query()
            )
        } else {
            write!(f, "elapsed:          not measured")
        }
    }
}

/// Evaluation cursor bound to one data set.
///
/// # Example
///
/// ```
/// use crg::{DataSet, GridStore};
///
/// let store = GridStore::builder(1.0, 101)
///     .lateral_offsets(vec![-3.0, 3.0])
///     .elevation_fn(|u, _| 0.01 * u)
///     .build()
///     .unwrap();
/// let data_set = DataSet::new(store);
/// let mut cp = data_set.contact_point();
///
/// let (x, y) = cp.to_world(50.0, 1.0).unwrap();
/// let (u, v) = cp.to_local(x, y).unwrap();
/// assert!((u - 50.0).abs() < 1e-9 && (v - 1.0).abs() < 1e-9);
///
/// let z = cp.world_to_elevation(x, y).unwrap();
/// assert!((z - 0.5).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct ContactPoint {
    data_set: DataSetId,
    geometry: Arc<EffectiveGeometry>,
    options: Options,
    cache: Option<CachedSolution>,
    stats: PerfStats,
}

impl ContactPoint {
    /// Create a contact point on a data set with the given options.
    ///
    /// # Errors
    ///
    /// Returns [`CrgError::InvalidOption`] if the options do not validate.
    pub fn new(data_set: &DataSet, options: Options) -> Result<Self> {
        options.validate()?;
        Ok(Self::bind(data_set, options))
    }

    pub(crate) fn bind(data_set: &DataSet, options: Options) -> Self {
        Self {
            data_set: data_set.id(),
            geometry: Arc::clone(data_set.effective()),
            options,
            cache: None,
            stats: PerfStats::default(),
        }
    }

    /// Data set this contact point reads.
    pub fn data_set(&self) -> DataSetId {
        self.data_set
    }

    /// Effective geometry snapshot this contact point reads.
    pub fn geometry(&self) -> &Arc<EffectiveGeometry> {
        &self.geometry
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Replace the options. Clears the inverse lookup cache.
    ///
    /// # Errors
    ///
    /// Returns [`CrgError::InvalidOption`] and keeps the previous options if
    /// the new ones do not validate.
    pub fn set_options(&mut self, options: Options) -> Result<()> {
        options.validate()?;
        debug!(data_set = %self.data_set, "contact point options changed");
        self.options = options;
        self.cache = None;
        Ok(())
    }

    /// Restore the default options.
    pub fn reset_options(&mut self) {
        self.options = Options::default();
        self.cache = None;
    }

    /// Follow the current effective geometry of a data set, e.g. after
    /// modifiers were applied. Clears the cache.
    pub fn rebind(&mut self, data_set: &DataSet) {
        self.data_set = data_set.id();
        self.geometry = Arc::clone(data_set.effective());
        self.cache = None;
    }

    /// Solution the next inverse lookup starts from.
    pub fn cached_solution(&self) -> Option<CachedSolution> {
        self.cache
    }

    pub fn enable_perf_stats(&mut self) {
        self.stats.enabled = true;
    }

    pub fn disable_perf_stats(&mut self) {
        self.stats.enabled = false;
    }

    /// Zero all counters, keeping the enabled flag.
    pub fn reset_perf_stats(&mut self) {
        self.stats = PerfStats {
            enabled: self.stats.enabled,
            ..PerfStats::default()
        };
    }

    pub fn perf_stats(&self) -> &PerfStats {
        &self.stats
    }

    /// World position of the point `(u, v)`.
    ///
    /// # Errors
    ///
    /// Returns [`CrgError::OutOfDomain`] for non-finite input or for `u`
    /// outside the reference line when its continuation is
    /// [`RefLineContinuation::None`].
    pub fn to_world(&mut self, u: f64, v: f64) -> Result<(f64, f64)> {
        self.record(|cp| {
            cp.check_finite_uv(u, v)?;
            let p = cp.geometry.path_point(u, cp.options.ref_line_continuation)?;
            Ok(p.offset(v))
        })
    }

    /// Reference line position `(u, v)` of a world point.
    ///
    /// Starts from the previous solution when there is one and falls back to
    /// a scan over the whole reference line.
    ///
    /// # Errors
    ///
    /// Returns [`CrgError::NoConvergence`] if no projection exists, and
    /// [`CrgError::OutOfDomain`] if it lies beyond the reference line while
    /// continuation is [`RefLineContinuation::None`]. The cache is cleared on
    /// failure.
    pub fn to_local(&mut self, x: f64, y: f64) -> Result<(f64, f64)> {
        self.record(|cp| cp.project(x, y))
    }

    /// Elevation at `(u, v)` under the current border options.
    ///
    /// # Errors
    ///
    /// Returns [`CrgError::OutOfDomain`] if a coordinate is outside the data
    /// and the border mode of its axis is [`BorderMode::None`](crate::BorderMode::None).
    pub fn elevation_at(&mut self, u: f64, v: f64) -> Result<f64> {
        self.record(|cp| border::elevation(&cp.geometry, &cp.options, u, v))
    }

    /// Heading and curvature at `(u, v)`.
    ///
    /// In [`CurvatureMode::RefLine`] the reference line values are returned;
    /// in [`CurvatureMode::LateralLine`] the curvature of the line of constant
    /// `v`, which is `κ / (1 - κ v)`.
    ///
    /// # Errors
    ///
    /// Returns [`CrgError::DegenerateCurvature`] if the lateral line passes
    /// through the curvature centre, plus the errors of [`Self::to_world`].
    pub fn heading_and_curvature(&mut self, u: f64, v: f64) -> Result<(f64, f64)> {
        self.record(|cp| {
            cp.check_finite_uv(u, v)?;
            let p = cp.geometry.path_point(u, cp.options.ref_line_continuation)?;
            let heading = geometry::wrap_angle(p.heading);

            match cp.options.curvature_mode {
                CurvatureMode::RefLine => Ok((heading, p.curvature)),
                CurvatureMode::LateralLine => {
                    let factor = 1.0 - p.curvature * v;
                    if factor <= MIN_LATERAL_FACTOR {
                        return Err(CrgError::DegenerateCurvature {
                            u,
                            v,
                            curvature: p.curvature,
                        });
                    }
                    Ok((heading, p.curvature / factor))
                }
            }
        })
    }

    /// Elevation at a world point; counts as a single query.
    ///
    /// # Errors
    ///
    /// Any error of [`Self::to_local`] or [`Self::elevation_at`].
    pub fn world_to_elevation(&mut self, x: f64, y: f64) -> Result<f64> {
        self.record(|cp| {
            let (u, v) = cp.project(x, y)?;
            border::elevation(&cp.geometry, &cp.options, u, v)
        })
    }

    fn record<T>(&mut self, query: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let start = self.stats.enabled.then(Instant::now);
        let result = query(self);

        self.stats.queries += 1;
        if result.is_err() {
            self.stats.failures += 1;
        }
        if let Some(start) = start {
            self.stats.elapsed += start.elapsed();
        }
        result
    }

    fn check_finite_uv(&self, u: f64, v: f64) -> Result<()> {
        let (min, max) = self.geometry.u_range();
        if !u.is_finite() {
            return Err(CrgError::OutOfDomain {
                axis: Axis::U,
                value: u,
                min,
                max,
            });
        }
        if !v.is_finite() {
            let (min, max) = self.geometry.v_range();
            return Err(CrgError::OutOfDomain {
                axis: Axis::V,
                value: v,
                min,
                max,
            });
        }
        Ok(())
    }

    fn project(&mut self, x: f64, y: f64) -> Result<(f64, f64)> {
        self.stats.inverse_queries += 1;

        if !(x.is_finite() && y.is_finite()) {
            self.cache = None;
            return Err(CrgError::NoConvergence { x, y });
        }

        let continuation = self.options.ref_line_continuation;
        let mut solution = None;
        let mut distant = None;

        // A foot point far outside the grid may sit on another leg of the
        // road; only the scan can tell.
        if let Some(cached) = self.cache.take() {
            match self.geometry.refine(x, y, cached.u, continuation) {
                Some(p) if self.geometry.near_lateral_range(p.v) => {
                    self.stats.cache_hits += 1;
                    solution = Some(p);
                }
                other => distant = other,
            }
        }

        if solution.is_none() {
            self.stats.scan_fallbacks += 1;
            let start = self.geometry.coarse_start(x, y);
            trace!(x, y, start, "inverse lookup falls back to coarse scan");
            let scanned = self.geometry.refine(x, y, start, continuation);

            solution = match (scanned, distant) {
                (Some(a), Some(b)) if b.v.abs() < a.v.abs() => Some(b),
                (scanned, distant) => scanned.or(distant),
            };
        }

        let Some(solution) = solution else {
            warn!(x, y, "no projection onto the reference line");
            return Err(CrgError::NoConvergence { x, y });
        };

        if continuation == RefLineContinuation::None && !self.geometry.contains_u(solution.u) {
            let (min, max) = self.geometry.u_range();
            return Err(CrgError::OutOfDomain {
                axis: Axis::U,
                value: solution.u,
                min,
                max,
            });
        }

        self.cache = Some(CachedSolution { u: solution.u });
        Ok((solution.u, solution.v))
    }
}
