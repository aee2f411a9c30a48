use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::str::FromStr;

use ndarray::{CowArray, Ix1};
use serde::{Deserialize, Serialize};

#[cfg(feature = "memmap")]
use super::MmapArray;
use super::{NdArray, OffsetArray, SequentialArray, Storage};
use crate::error::{Error, Result};

/// Storage strategy, selected when an embedder is configured.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageStrategy {
    /// Decode all vectors into memory.
    InMemory,

    /// Keep byte offsets, decode a record per lookup.
    IndexedDisk,

    /// Keep a forward read cursor.
    SequentialDisk,

    /// Memory map an external array file described by a sidecar file.
    MmapExternal,
}

impl FromStr for StorageStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        use StorageStrategy::*;

        match s {
            "in_memory" => Ok(InMemory),
            "indexed_disk" => Ok(IndexedDisk),
            "sequential_disk" => Ok(SequentialDisk),
            "mmap_external" => Ok(MmapExternal),
            unknown => Err(Error::Format(format!(
                "Unknown storage strategy: {}",
                unknown
            ))),
        }
    }
}

impl fmt::Display for StorageStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use StorageStrategy::*;

        let name = match self {
            InMemory => "in_memory",
            IndexedDisk => "indexed_disk",
            SequentialDisk => "sequential_disk",
            MmapExternal => "mmap_external",
        };

        f.write_str(name)
    }
}

/// Storage types wrapper.
///
/// Wraps the storage types known to this crate, such that the
/// strategy can be chosen at run time while `Embeddings<SimpleVocab,
/// StorageWrap>` remains a single type.
#[derive(Debug)]
pub enum StorageWrap {
    NdArray(NdArray),
    OffsetArray(OffsetArray<File>),
    SequentialArray(SequentialArray<BufReader<File>>),
    #[cfg(feature = "memmap")]
    MmapArray(MmapArray),
}

impl StorageWrap {
    /// The strategy of the wrapped storage.
    pub fn strategy(&self) -> StorageStrategy {
        match self {
            StorageWrap::NdArray(_) => StorageStrategy::InMemory,
            StorageWrap::OffsetArray(_) => StorageStrategy::IndexedDisk,
            StorageWrap::SequentialArray(_) => StorageStrategy::SequentialDisk,
            #[cfg(feature = "memmap")]
            StorageWrap::MmapArray(_) => StorageStrategy::MmapExternal,
        }
    }
}

impl Storage for StorageWrap {
    fn embedding(&mut self, idx: usize) -> Result<CowArray<f32, Ix1>> {
        match self {
            StorageWrap::NdArray(inner) => inner.embedding(idx),
            StorageWrap::OffsetArray(inner) => inner.embedding(idx),
            StorageWrap::SequentialArray(inner) => inner.embedding(idx),
            #[cfg(feature = "memmap")]
            StorageWrap::MmapArray(inner) => inner.embedding(idx),
        }
    }

    fn shape(&self) -> (usize, usize) {
        match self {
            StorageWrap::NdArray(inner) => inner.shape(),
            StorageWrap::OffsetArray(inner) => inner.shape(),
            StorageWrap::SequentialArray(inner) => inner.shape(),
            #[cfg(feature = "memmap")]
            StorageWrap::MmapArray(inner) => inner.shape(),
        }
    }
}

impl From<NdArray> for StorageWrap {
    fn from(s: NdArray) -> Self {
        StorageWrap::NdArray(s)
    }
}

impl From<OffsetArray<File>> for StorageWrap {
    fn from(s: OffsetArray<File>) -> Self {
        StorageWrap::OffsetArray(s)
    }
}

impl From<SequentialArray<BufReader<File>>> for StorageWrap {
    fn from(s: SequentialArray<BufReader<File>>) -> Self {
        StorageWrap::SequentialArray(s)
    }
}

#[cfg(feature = "memmap")]
impl From<MmapArray> for StorageWrap {
    fn from(s: MmapArray) -> Self {
        StorageWrap::MmapArray(s)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::{StorageStrategy, StorageWrap};
    use crate::storage::{NdArray, Storage};

    #[test]
    fn strategy_names_roundtrip() {
        for strategy in &[
            StorageStrategy::InMemory,
            StorageStrategy::IndexedDisk,
            StorageStrategy::SequentialDisk,
            StorageStrategy::MmapExternal,
        ] {
            assert_eq!(
                strategy.to_string().parse::<StorageStrategy>().unwrap(),
                *strategy
            );
        }

        assert!("lazy".parse::<StorageStrategy>().is_err());
    }

    #[test]
    fn wrapper_delegates() {
        let mut storage = StorageWrap::from(NdArray::new(Array2::eye(3)));
        assert_eq!(storage.strategy(), StorageStrategy::InMemory);
        assert_eq!(storage.shape(), (3, 3));
        assert_eq!(storage.embedding(1).unwrap().to_vec(), vec![0f32, 1., 0.]);
        assert!(storage.embedding(3).unwrap_err().is_oov());
    }
}
