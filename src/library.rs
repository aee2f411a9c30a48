//! Registry of named embedders.

use fnv::FnvHashMap;
use tracing::info;

use crate::config::LibraryConfig;
use crate::embedder::Embedder;
use crate::error::{Error, Result};

/// Named embedders, built on first access.
#[derive(Debug, Default)]
pub struct Library {
    embedders: Vec<(String, Embedder)>,
    indices: FnvHashMap<String, usize>,
}

impl Library {
    pub fn new() -> Self {
        Library::default()
    }

    /// Construct a library from a configuration.
    pub fn from_config(config: LibraryConfig) -> Result<Self> {
        let mut library = Library::new();
        for embedder_config in config.embedders {
            let name = embedder_config.name();
            library.register(name, embedder_config.into_embedder())?;
        }

        Ok(library)
    }

    /// Register an embedder under `name`.
    ///
    /// Fails when `name` is already taken.
    pub fn register(&mut self, name: impl Into<String>, embedder: Embedder) -> Result<()> {
        let name = name.into();
        if self.indices.contains_key(&name) {
            return Err(Error::Registry(format!(
                "embedder '{}' is already registered",
                name
            )));
        }

        self.indices.insert(name.clone(), self.embedders.len());
        self.embedders.push((name, embedder));

        Ok(())
    }

    /// Names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.embedders.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.embedders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embedders.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }

    /// Get the embedder registered as `name`, building it if necessary.
    pub fn get(&mut self, name: &str) -> Result<&mut Embedder> {
        let idx = *self
            .indices
            .get(name)
            .ok_or_else(|| Error::Registry(format!("no embedder named '{}'", name)))?;

        let embedder = &mut self.embedders[idx].1;
        if !embedder.is_built() {
            info!(name, path = ?embedder.path(), "building embedder");
            embedder.build()?;
        }

        Ok(embedder)
    }
}
