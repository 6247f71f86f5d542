//! # CRG - Curved Regular Grid road surfaces
//!
//! Evaluation engine for road surfaces stored as a regular elevation grid
//! along a curved reference line.
//!
//! ## Features
//!
//! - **Bidirectional**: `(u, v)` to world `(x, y)` and back, exactly invertible
//!   on arc segments
//! - **Border policies**: fail, fade to zero, keep, repeat or reflect beyond
//!   the data, per axis
//! - **Modifiers**: scale and reposition the road without touching the raw data
//! - **Cursors**: per-wheel [`ContactPoint`]s with their own options and
//!   inverse lookup cache
//!
//! ## Quick Start
//!
//! ```
//! use crg::{DataSet, GridStore, Modifiers};
//!
//! let store = GridStore::builder(0.1, 1001)
//!     .lateral_offsets(vec![-2.0, -0.5, 0.5, 2.0])
//!     .elevation_fn(|u, v| 0.002 * (u * 3.0).sin() + 0.001 * v)
//!     .curvatures(0.0, 0.0, 0.0, vec![0.01; 1001])
//!     .build()?;
//!
//! let mut data_set = DataSet::new(store);
//! data_set.apply_modifiers(Modifiers { scale_z: 2.0, ..Modifiers::default() })?;
//!
//! let mut cp = data_set.contact_point();
//! let (x, y) = cp.to_world(42.0, 0.3)?;
//! let z = cp.world_to_elevation(x, y)?;
//! assert!((z - cp.elevation_at(42.0, 0.3)?).abs() < 1e-4);
//! # Ok::<(), crg::CrgError>(())
//! ```
//!
//! ## Coordinates
//!
//! - `u`: position along the reference line, stations every `u_increment`
//! - `v`: lateral offset, positive to the left of the direction of travel
//! - Elevation is `reference_elevation(u) + bank(u) * v + grid(u, v)`

mod border;
pub mod contact;
pub mod dataset;
pub mod error;
pub mod geometry;
pub mod modifiers;
pub mod options;
pub mod registry;
pub mod store;

// Re-export main types at crate root for convenience
pub use contact::{CachedSolution, ContactPoint, PerfStats};
pub use dataset::{DataSet, DataSetId};
pub use error::{Axis, CrgError, Result};
pub use geometry::{EffectiveGeometry, PathPoint};
pub use modifiers::{apply_modifiers, Modifiers, NanMode, RefLineOffset, ReferencePoint};
pub use options::{BorderMode, CurvatureMode, Options, RefLineContinuation};
pub use registry::{DataSetRegistry, RegistryBuilder, RegistryStats};
pub use store::{ElevationLine, GridStore, GridStoreBuilder, ReferenceLine, StationPose};
