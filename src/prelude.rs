//! Prelude exports the most commonly-used types and traits.

pub use crate::batch::stack_vectors;

pub use crate::config::{EmbedderConfig, LibraryConfig};

pub use crate::embedder::{Embedder, Key};

pub use crate::embeddings::Embeddings;

pub use crate::error::{Error, OutOfVocabulary, Result};

pub use crate::fetch::{CommandFetcher, Fetch};

pub use crate::io::{Header, ReadRecord, VectorFormat};

pub use crate::library::Library;

#[cfg(feature = "memmap")]
pub use crate::storage::MmapArray;

pub use crate::storage::{
    NdArray, OffsetArray, SequentialArray, Storage, StorageStrategy, StorageWrap,
};

pub use crate::vocab::{SimpleVocab, Vocab};
