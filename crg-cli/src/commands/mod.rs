pub mod eval;
pub mod info;
pub mod options;
pub mod perf;
pub mod roundtrip;
pub mod scan;
pub mod verify;

use anyhow::{Context, Result};
use crg::{ContactPoint, DataSet, DataSetId, DataSetRegistry, Modifiers, Options, RegistryBuilder};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use crate::{roads, RoadArgs};

/// Registered road data set plus the options requested on the command line.
pub struct Session {
    pub registry: DataSetRegistry,
    pub id: DataSetId,
    pub options: Options,
    pub modifiers: Modifiers,
}

impl Session {
    pub fn open(args: &RoadArgs) -> Result<Self> {
        let registry = RegistryBuilder::from_env()
            .context("Invalid CRG_* environment configuration")?
            .build();

        let store = roads::build(args.road, args.length, args.width, args.increment)
            .context("Failed to build road data")?;
        let id = registry
            .insert(store)
            .context("Failed to register road data")?;

        let modifiers = match &args.modifiers {
            Some(path) => load_json::<Modifiers>(path)?,
            None => Modifiers::default(),
        };
        registry
            .apply_modifiers(id, modifiers.clone())
            .context("Failed to apply modifiers")?;

        let options = match &args.options {
            Some(path) => load_json::<Options>(path)?,
            None => *registry.default_options(),
        };
        options.validate().context("Invalid evaluation options")?;

        Ok(Self {
            registry,
            id,
            options,
            modifiers,
        })
    }

    pub fn data_set(&self) -> Result<Arc<DataSet>> {
        Ok(self.registry.get(self.id)?)
    }

    /// Contact point on the current data set, using the session options.
    pub fn contact_point(&self) -> Result<ContactPoint> {
        let mut cp = self
            .registry
            .create_contact_point(self.id)
            .context("Failed to create contact point")?;
        cp.set_options(self.options)?;
        Ok(cp)
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path.display()))
}
