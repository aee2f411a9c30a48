//! Embedder configuration.
//!
//! Embedders can be configured in TOML:
//!
//! ```toml
//! [[embedder]]
//! name = "wiki"
//! path = "/data/wiki.zh.vec"
//! format = "text"
//! storage = "indexed_disk"
//!
//! [[embedder]]
//! name = "news"
//! path = "/data/news.toml"
//! storage = "mmap_external"
//! array_path = "/fast/news.f32"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::embedder::Embedder;
use crate::error::{Error, Result};
use crate::io::VectorFormat;
use crate::storage::StorageStrategy;

/// Configuration of a single embedder.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct EmbedderConfig {
    /// Registry name, defaults to the file name of `path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Vector file, or the descriptor file for `mmap_external`.
    pub path: PathBuf,

    #[serde(default = "default_format")]
    pub format: VectorFormat,

    #[serde(default = "default_storage")]
    pub storage: StorageStrategy,

    /// Overrides the array file named in the descriptor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_path: Option<PathBuf>,

    /// Download URL for a missing vector file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

fn default_format() -> VectorFormat {
    VectorFormat::Text
}

fn default_storage() -> StorageStrategy {
    StorageStrategy::InMemory
}

impl EmbedderConfig {
    pub fn new(path: impl Into<PathBuf>, format: VectorFormat, storage: StorageStrategy) -> Self {
        EmbedderConfig {
            name: None,
            path: path.into(),
            format,
            storage,
            array_path: None,
            download_url: None,
        }
    }

    /// Parse a configuration from a TOML string.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        toml::from_str(toml)
            .map_err(|e| Error::Format(format!("Cannot deserialize embedder configuration: {}", e)))
    }

    /// Read a configuration from a TOML file.
    pub fn read_toml(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&read_to_string(path.as_ref())?)
    }

    /// Name of the configured embedder.
    pub fn name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self
                .path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    /// Construct the (unbuilt) embedder.
    pub fn into_embedder(self) -> Embedder {
        Embedder::new(self.path, self.format, self.storage)
            .with_array_path(self.array_path)
            .with_download_url(self.download_url)
    }
}

/// Configuration of a set of embedders.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct LibraryConfig {
    #[serde(default, rename = "embedder")]
    pub embedders: Vec<EmbedderConfig>,
}

impl LibraryConfig {
    /// Parse a configuration from a TOML string.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        toml::from_str(toml)
            .map_err(|e| Error::Format(format!("Cannot deserialize library configuration: {}", e)))
    }

    /// Read a configuration from a TOML file.
    pub fn read_toml(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&read_to_string(path.as_ref())?)
    }
}

fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::read_error(format!("Cannot read configuration {:?}", path), e))
}
