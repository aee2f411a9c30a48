//! Embedding matrix representations.
//!
//! Four strategies trade memory for access speed:
//!
//! * `NdArray`: all vectors are decoded into memory up front.
//! * `OffsetArray`: only the byte offset of each record is kept, every
//!   lookup seeks to the record and decodes it.
//! * `SequentialArray`: keeps a single read cursor. Cheap for lookups
//!   in increasing index order, lookups before the cursor rescan the
//!   file from the start.
//! * `MmapArray`: a flat array file that is memory mapped, lookups
//!   return views into the mapping.

use ndarray::{CowArray, Ix1};

use crate::error::{Error, Result};

mod array;
#[cfg(feature = "memmap")]
pub use self::array::MmapArray;
pub use self::array::NdArray;

mod disk;
pub(crate) use self::disk::open_file;
pub use self::disk::{OffsetArray, SequentialArray};

mod wrappers;
pub use self::wrappers::{StorageStrategy, StorageWrap};

/// Embedding matrix storage.
///
/// To allow for embeddings to be stored in different manners (e.g.
/// in memory or on disk), this trait abstracts over concrete storage
/// types. Lookups take `&mut self`, since disk-backed storage moves
/// its read handle.
pub trait Storage {
    /// Get the embedding at `idx`.
    ///
    /// Fails with `Error::OutOfVocabulary` when `idx` is not a row of
    /// the matrix.
    fn embedding(&mut self, idx: usize) -> Result<CowArray<f32, Ix1>>;

    /// Shape of the embedding matrix (rows, dimensionality).
    fn shape(&self) -> (usize, usize);
}

pub(crate) fn check_idx(idx: usize, len: usize) -> Result<()> {
    if idx < len {
        Ok(())
    } else {
        Err(Error::oov_index(idx, len))
    }
}
