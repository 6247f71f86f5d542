//! Registry of loaded data sets.
//!
//! This module provides [`DataSetRegistry`], a thread-safe handle table for
//! data sets. It hands out [`DataSetId`]s, creates contact points from them
//! and applies modifiers with a copy-on-apply strategy, so that readers never
//! observe a half-applied geometry.
//!
//! ```
//! use crg::{DataSetRegistry, GridStore, Modifiers};
//!
//! let registry = DataSetRegistry::builder().max_data_sets(16).build();
//! let id = registry
//!     .insert(GridStore::builder(1.0, 11).build().unwrap())
//!     .unwrap();
//!
//! registry
//!     .apply_modifiers(id, Modifiers { scale_z: 2.0, ..Modifiers::default() })
//!     .unwrap();
//! let mut cp = registry.create_contact_point(id).unwrap();
//! assert_eq!(cp.elevation_at(5.0, 0.0).unwrap(), 0.0);
//!
//! registry.release(id).unwrap();
//! assert!(registry.create_contact_point(id).is_err());
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use moka::ops::compute::{CompResult, Op};
use moka::sync::Cache;
use tracing::{debug, info};

use crate::contact::ContactPoint;
use crate::dataset::{DataSet, DataSetId};
use crate::error::{CrgError, Result};
use crate::modifiers::Modifiers;
use crate::options::{BorderMode, CurvatureMode, Options, RefLineContinuation};
use crate::store::GridStore;

/// Statistics about registry lookups.
#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    /// Number of data sets currently registered.
    pub entry_count: u64,
    /// Number of lookups that found their data set.
    pub hit_count: u64,
    /// Number of lookups for unknown or released handles.
    pub miss_count: u64,
}

impl RegistryStats {
    /// Calculate the lookup hit rate (0.0 to 1.0).
    ///
    /// Returns 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

/// Thread-safe table of loaded data sets.
///
/// Data sets stay registered until released. With a capacity bound, inserts
/// beyond it are rejected. Modifier application and release are serialized
/// per handle, so a released handle never comes back.
pub struct DataSetRegistry {
    data_sets: Cache<DataSetId, Arc<DataSet>>,
    capacity: Option<u64>,
    len: AtomicU64,
    default_options: Options,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl Default for DataSetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSetRegistry {
    /// Create an unbounded registry with default contact point options.
    pub fn new() -> Self {
        RegistryBuilder::new().build()
    }

    /// Create a builder for a custom registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Register a store without modifiers and return its handle.
    ///
    /// # Errors
    ///
    /// Returns [`CrgError::RegistryFull`] if the capacity bound is reached.
    pub fn insert(&self, store: GridStore) -> Result<DataSetId> {
        self.insert_data_set(DataSet::new(store))
    }

    /// Register an existing data set under its own handle, replacing a data
    /// set registered with the same handle.
    ///
    /// # Errors
    ///
    /// Returns [`CrgError::RegistryFull`] if the capacity bound is reached.
    pub fn insert_data_set(&self, data_set: DataSet) -> Result<DataSetId> {
        let id = data_set.id();
        let replacing = self.data_sets.contains_key(&id);
        if !replacing {
            self.reserve_slot()?;
        }

        let data_set = Arc::new(data_set);
        match self
            .data_sets
            .entry(id)
            .and_compute_with(|_| Op::Put(data_set))
        {
            // Released or registered concurrently since the check above.
            CompResult::Inserted(_) if replacing => {
                self.len.fetch_add(1, Ordering::AcqRel);
            }
            CompResult::ReplacedWith(_) if !replacing => {
                self.len.fetch_sub(1, Ordering::AcqRel);
            }
            _ => {}
        }

        info!(data_set = %id, "data set registered");
        Ok(id)
    }

    fn reserve_slot(&self) -> Result<()> {
        let Some(capacity) = self.capacity else {
            self.len.fetch_add(1, Ordering::AcqRel);
            return Ok(());
        };
        self.len
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |len| {
                (len < capacity).then_some(len + 1)
            })
            .map(|_| ())
            .map_err(|_| CrgError::RegistryFull { capacity })
    }

    /// Look up a data set.
    ///
    /// # Errors
    ///
    /// Returns [`CrgError::UnknownDataSet`] for unknown or released handles.
    pub fn get(&self, id: DataSetId) -> Result<Arc<DataSet>> {
        match self.data_sets.get(&id) {
            Some(data_set) => {
                self.hit_count.fetch_add(1, Ordering::Relaxed);
                Ok(data_set)
            }
            None => {
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                Err(CrgError::UnknownDataSet { id: id.get() })
            }
        }
    }

    /// Returns true if the handle refers to a registered data set.
    pub fn contains(&self, id: DataSetId) -> bool {
        self.data_sets.contains_key(&id)
    }

    /// Apply modifiers to a registered data set.
    ///
    /// The new effective geometry is built on a copy and swapped in when
    /// complete; concurrent readers see either the old or the new one.
    ///
    /// # Errors
    ///
    /// Returns [`CrgError::UnknownDataSet`] or [`CrgError::InvalidModifier`];
    /// the registered data set is unchanged on error.
    pub fn apply_modifiers(&self, id: DataSetId, modifiers: Modifiers) -> Result<()> {
        let mut outcome = Err(CrgError::UnknownDataSet { id: id.get() });

        self.data_sets.entry(id).and_compute_with(|entry| {
            let Some(entry) = entry else {
                return Op::Nop;
            };
            let mut updated = DataSet::clone(entry.value());
            match updated.apply_modifiers(modifiers) {
                Ok(()) => {
                    outcome = Ok(());
                    Op::Put(Arc::new(updated))
                }
                Err(e) => {
                    outcome = Err(e);
                    Op::Nop
                }
            }
        });

        let counter = match outcome {
            Err(CrgError::UnknownDataSet { .. }) => &self.miss_count,
            _ => &self.hit_count,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        outcome
    }

    /// Create a contact point with the registry's default options.
    ///
    /// # Errors
    ///
    /// Returns [`CrgError::UnknownDataSet`] for unknown or released handles.
    pub fn create_contact_point(&self, id: DataSetId) -> Result<ContactPoint> {
        let data_set = self.get(id)?;
        ContactPoint::new(&data_set, self.default_options)
    }

    /// Point an existing contact point at the current geometry of its data set.
    ///
    /// # Errors
    ///
    /// Returns [`CrgError::UnknownDataSet`] if the data set was released.
    pub fn refresh_contact_point(&self, contact_point: &mut ContactPoint) -> Result<()> {
        let data_set = self.get(contact_point.data_set())?;
        contact_point.rebind(&data_set);
        Ok(())
    }

    /// Release one data set.
    ///
    /// # Errors
    ///
    /// Returns [`CrgError::UnknownDataSet`] if the handle is not registered.
    pub fn release(&self, id: DataSetId) -> Result<()> {
        let result = self.data_sets.entry(id).and_compute_with(|entry| match entry {
            Some(_) => Op::Remove,
            None => Op::Nop,
        });

        match result {
            CompResult::Removed(_) => {
                self.len.fetch_sub(1, Ordering::AcqRel);
                debug!(data_set = %id, "data set released");
                Ok(())
            }
            _ => Err(CrgError::UnknownDataSet { id: id.get() }),
        }
    }

    /// Release all data sets.
    pub fn release_all(&self) {
        let ids: Vec<DataSetId> = self.data_sets.iter().map(|(id, _)| *id).collect();
        let released = ids.into_iter().filter(|&id| self.release(id).is_ok()).count();
        debug!(released, "all data sets released");
    }

    /// Get registry statistics.
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            entry_count: self.len.load(Ordering::Acquire),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        }
    }

    /// Maximum number of registered data sets, if bounded.
    pub fn capacity(&self) -> Option<u64> {
        self.capacity
    }

    /// Options given to new contact points.
    pub fn default_options(&self) -> &Options {
        &self.default_options
    }
}

/// Builder for creating [`DataSetRegistry`] with custom configuration.
///
/// # Example
///
/// ```
/// use crg::{BorderMode, Options, RegistryBuilder};
///
/// let registry = RegistryBuilder::new()
///     .max_data_sets(8)
///     .default_options(Options {
///         border_mode_u: BorderMode::Repeat,
///         ..Options::default()
///     })
///     .build();
/// assert_eq!(registry.capacity(), Some(8));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    max_data_sets: Option<u64>,
    default_options: Options,
}

impl RegistryBuilder {
    /// Create a builder for an unbounded registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder configured from environment variables.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `CRG_MAX_DATA_SETS` | Maximum registered data sets | unbounded |
    /// | `CRG_BORDER_MODE_U` | Default border mode along u | `ex-keep` |
    /// | `CRG_BORDER_MODE_V` | Default border mode along v | `ex-keep` |
    /// | `CRG_REF_LINE` | Reference line continuation | `extrapolate` |
    /// | `CRG_CURVATURE_MODE` | Reported curvature | `lateral-line` |
    ///
    /// # Example
    ///
    /// ```bash
    /// export CRG_MAX_DATA_SETS=4
    /// export CRG_BORDER_MODE_U=repeat
    /// export CRG_REF_LINE=close-track
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`CrgError::InvalidOption`] if a variable is set to an
    /// unparsable value.
    pub fn from_env() -> Result<Self> {
        let max_data_sets = match std::env::var("CRG_MAX_DATA_SETS") {
            Ok(value) => Some(value.trim().parse::<u64>().map_err(|_| {
                CrgError::InvalidOption {
                    option: "CRG_MAX_DATA_SETS",
                    value,
                }
            })?),
            Err(_) => None,
        };

        let mut options = Options::default();
        if let Some(mode) = env_parse::<BorderMode>("CRG_BORDER_MODE_U")? {
            options.border_mode_u = mode;
        }
        if let Some(mode) = env_parse::<BorderMode>("CRG_BORDER_MODE_V")? {
            options.border_mode_v = mode;
        }
        if let Some(mode) = env_parse::<RefLineContinuation>("CRG_REF_LINE")? {
            options.ref_line_continuation = mode;
        }
        if let Some(mode) = env_parse::<CurvatureMode>("CRG_CURVATURE_MODE")? {
            options.curvature_mode = mode;
        }

        Ok(Self {
            max_data_sets,
            default_options: options,
        })
    }

    /// Bound the number of registered data sets; inserts beyond it fail.
    pub fn max_data_sets(mut self, max: u64) -> Self {
        self.max_data_sets = Some(max);
        self
    }

    /// Options given to contact points created by the registry.
    pub fn default_options(mut self, options: Options) -> Self {
        self.default_options = options;
        self
    }

    /// Build the registry.
    pub fn build(self) -> DataSetRegistry {
        // Unbounded: a released handle is the only way out of the table.
        DataSetRegistry {
            data_sets: Cache::builder().build(),
            capacity: self.max_data_sets,
            len: AtomicU64::new(0),
            default_options: self.default_options,
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        }
    }
}

fn env_parse<T>(name: &'static str) -> Result<Option<T>>
where
    T: std::str::FromStr<Err = CrgError>,
{
    match std::env::var(name) {
        Ok(value) => value.parse().map(Some),
        Err(_) => Ok(None),
    }
}
