//! A raw grid store together with its modifiers and effective geometry.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::contact::ContactPoint;
use crate::error::Result;
use crate::geometry::EffectiveGeometry;
use crate::modifiers::{apply_modifiers, Modifiers};
use crate::options::Options;
use crate::store::GridStore;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Handle of a data set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataSetId(u64);

impl DataSetId {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric value of the handle.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DataSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Raw data plus the geometry derived from it by the current modifiers.
///
/// The raw store is never changed. Applying modifiers replaces the effective
/// geometry with a new shared value; contact points created earlier keep
/// reading their snapshot until [`ContactPoint::rebind`] is called.
#[derive(Debug, Clone)]
pub struct DataSet {
    id: DataSetId,
    raw: Arc<GridStore>,
    modifiers: Modifiers,
    effective: Arc<EffectiveGeometry>,
}

impl DataSet {
    /// Wrap a store without modifiers.
    pub fn new(store: GridStore) -> Self {
        let effective = EffectiveGeometry::from_store(&store);
        Self {
            id: DataSetId::next(),
            raw: Arc::new(store),
            modifiers: Modifiers::default(),
            effective: Arc::new(effective),
        }
    }

    /// Wrap a store and apply `modifiers`.
    ///
    /// # Errors
    ///
    /// Returns [`CrgError::InvalidModifier`](crate::CrgError::InvalidModifier)
    /// if the modifiers are degenerate.
    pub fn with_modifiers(store: GridStore, modifiers: Modifiers) -> Result<Self> {
        let mut data_set = Self::new(store);
        data_set.apply_modifiers(modifiers)?;
        Ok(data_set)
    }

    pub fn id(&self) -> DataSetId {
        self.id
    }

    /// Replace the modifiers and recompute the effective geometry from the raw data.
    ///
    /// # Errors
    ///
    /// Returns [`CrgError::InvalidModifier`](crate::CrgError::InvalidModifier);
    /// the data set is unchanged in that case.
    pub fn apply_modifiers(&mut self, modifiers: Modifiers) -> Result<()> {
        let effective = apply_modifiers(&self.raw, &modifiers)?;
        debug!(data_set = %self.id, "effective geometry recomputed");
        self.effective = Arc::new(effective);
        self.modifiers = modifiers;
        Ok(())
    }

    /// Return to the unmodified raw geometry.
    pub fn remove_modifiers(&mut self) {
        self.modifiers = Modifiers::default();
        self.effective = Arc::new(EffectiveGeometry::from_store(&self.raw));
    }

    /// Currently applied modifiers.
    pub fn modifiers(&self) -> &Modifiers {
        &self.modifiers
    }

    /// The pristine store.
    pub fn raw(&self) -> &Arc<GridStore> {
        &self.raw
    }

    /// Geometry all queries read.
    pub fn effective(&self) -> &Arc<EffectiveGeometry> {
        &self.effective
    }

    /// Station range of the effective geometry.
    pub fn u_range(&self) -> (f64, f64) {
        self.effective.u_range()
    }

    /// Lateral range of the effective geometry.
    pub fn v_range(&self) -> (f64, f64) {
        self.effective.v_range()
    }

    /// New contact point with default options.
    pub fn contact_point(&self) -> ContactPoint {
        ContactPoint::bind(self, Options::default())
    }

    /// New contact point with the given options.
    ///
    /// # Errors
    ///
    /// Returns [`CrgError::InvalidOption`](crate::CrgError::InvalidOption) if
    /// the options do not validate.
    pub fn contact_point_with(&self, options: Options) -> Result<ContactPoint> {
        ContactPoint::new(self, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrgError;

    fn store() -> GridStore {
        GridStore::builder(1.0, 21)
            .lateral_offsets(vec![-2.0, 2.0])
            .elevation_fn(|u, v| u + v)
            .build()
            .unwrap()
    }

    #[test]
    fn test_ids_are_unique() {
        let a = DataSet::new(store());
        let b = DataSet::new(store());
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn test_apply_and_remove_modifiers() {
        let mut data_set = DataSet::new(store());
        let original = Arc::clone(data_set.effective());

        data_set
            .apply_modifiers(Modifiers {
                scale_length: 0.5,
                ..Modifiers::default()
            })
            .unwrap();
        assert_eq!(data_set.u_range(), (0.0, 10.0));
        assert_eq!(data_set.raw().u_range(), (0.0, 20.0));

        data_set.remove_modifiers();
        assert_eq!(**data_set.effective(), *original);
        assert!(data_set.modifiers().is_identity());
    }

    #[test]
    fn test_failed_apply_keeps_state() {
        let mut data_set = DataSet::new(store());
        let scaled = Modifiers {
            scale_z: 2.0,
            ..Modifiers::default()
        };
        data_set.apply_modifiers(scaled.clone()).unwrap();
        let before = Arc::clone(data_set.effective());

        let result = data_set.apply_modifiers(Modifiers {
            scale_width: 0.0,
            ..Modifiers::default()
        });
        assert!(matches!(result, Err(CrgError::InvalidModifier { .. })));
        assert_eq!(*data_set.modifiers(), scaled);
        assert!(Arc::ptr_eq(&before, data_set.effective()));
    }

    #[test]
    fn test_contact_point_keeps_snapshot_until_rebind() {
        let mut data_set = DataSet::new(store());
        let mut cp = data_set.contact_point();
        assert_eq!(cp.elevation_at(5.0, 1.0).unwrap(), 6.0);

        data_set
            .apply_modifiers(Modifiers {
                scale_z: 2.0,
                ..Modifiers::default()
            })
            .unwrap();
        assert!((cp.elevation_at(5.0, 1.0).unwrap() - 6.0).abs() < 1e-6);

        cp.rebind(&data_set);
        assert!((cp.elevation_at(5.0, 1.0).unwrap() - 12.0).abs() < 1e-6);
    }
}
