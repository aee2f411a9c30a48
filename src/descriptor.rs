//! Sidecar metadata of externally stored embedding matrices.
//!
//! The descriptor is a TOML file that lists the vocabulary and the
//! shape and element type of a flat array file:
//!
//! ```toml
//! index2word = ["薄餡", "隼興", "gb", "en", "Alvin"]
//! vector_size = 3
//! syn0dtype = "float32"
//! syn0filename = "vectors.f32"
//! ```
//!
//! The array file has no header, it holds `index2word.len() *
//! vector_size` elements in row-major order and in the native byte
//! order of the host.

use std::fs;
use std::mem::size_of;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Element type of an array file.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum ElementType {
    #[serde(rename = "float32", alias = "f4", alias = "<f4")]
    Float32,

    #[serde(rename = "float64", alias = "f8", alias = "<f8")]
    Float64,
}

impl ElementType {
    /// Size of an element in bytes.
    pub fn size(self) -> usize {
        match self {
            ElementType::Float32 => size_of::<f32>(),
            ElementType::Float64 => size_of::<f64>(),
        }
    }
}

/// Descriptor of an external embedding matrix.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ExternalArrayDescriptor {
    /// Words, in the order of the matrix rows.
    #[serde(rename = "index2word")]
    pub words: Vec<String>,

    /// Embedding dimensionality.
    #[serde(rename = "vector_size")]
    pub dim: usize,

    #[serde(rename = "syn0dtype")]
    pub dtype: ElementType,

    /// Path of the array file.
    ///
    /// Relative paths are resolved against the directory of the
    /// descriptor file.
    #[serde(rename = "syn0filename")]
    pub array_path: PathBuf,

    /// Optional redundant shape, verified when present.
    #[serde(rename = "syn0shape", default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<[usize; 2]>,
}

impl ExternalArrayDescriptor {
    /// Read a descriptor from a TOML file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .map_err(|e| Error::read_error(format!("Cannot read descriptor {:?}", path), e))?;
        let mut descriptor: ExternalArrayDescriptor = toml::from_str(&data)
            .map_err(|e| Error::Format(format!("Cannot deserialize descriptor: {}", e)))?;

        if descriptor.array_path.is_relative() {
            if let Some(parent) = path.parent() {
                descriptor.array_path = parent.join(&descriptor.array_path);
            }
        }

        descriptor.validate()?;

        Ok(descriptor)
    }

    fn validate(&self) -> Result<()> {
        if self.dim == 0 {
            return Err(Error::Format(String::from(
                "Embedding dimensionality must be positive",
            )));
        }

        if let Some([rows, cols]) = self.shape {
            if rows != self.words.len() || cols != self.dim {
                return Err(Error::Format(format!(
                    "Array shape ({}, {}) does not match the descriptor ({}, {})",
                    rows,
                    cols,
                    self.words.len(),
                    self.dim
                )));
            }
        }

        Ok(())
    }

    /// Number of vectors.
    pub fn vector_count(&self) -> usize {
        self.words.len()
    }

    /// Path of the array file, unless it is overridden.
    pub fn resolve_array_path<'a>(&'a self, array_path: Option<&'a Path>) -> &'a Path {
        array_path.unwrap_or(&self.array_path)
    }
}
