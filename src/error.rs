use std::fmt;
use std::io;

use ndarray::ShapeError;
use thiserror::Error;

/// `Result` type alias for operations that can lead to I/O errors.
pub type Result<T> = ::std::result::Result<T, Error>;

/// The key of a failed lookup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OutOfVocabulary {
    /// A word that is not in the vocabulary.
    Word(String),

    /// An index outside `[0, vocab_size)`.
    Index { idx: usize, len: usize },
}

impl fmt::Display for OutOfVocabulary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutOfVocabulary::Word(word) => write!(f, "unknown word '{}'", word),
            OutOfVocabulary::Index { idx, len } => {
                write!(f, "index {} out of range (vocabulary size {})", idx, len)
            }
        }
    }
}

/// Errors in reading or looking up embeddings.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Invalid file format.
    #[error("Invalid file format: {0}")]
    Format(String),

    /// The stream ended while a binary record was being read.
    #[error("Unexpected end of input in record {record}; is the count incorrect or the file damaged?")]
    UnexpectedEof { record: usize },

    /// Lookup of a word or index that is not in the vocabulary.
    #[error("Out of vocabulary: {0}")]
    OutOfVocabulary(OutOfVocabulary),

    /// Lookup on an embedder whose `build` step has not run.
    #[error("Embedder is not built, call build() first")]
    NotBuilt,

    /// I/O error while reading.
    #[error("{desc}: {error}")]
    Read { desc: String, error: io::Error },

    /// Retrieval of a missing source file failed.
    #[error("Cannot fetch {desc}: {reason}")]
    Fetch { desc: String, reason: String },

    /// Registry lookups and registrations.
    #[error("Registry error: {0}")]
    Registry(String),

    /// Number of items does not fit in `usize`.
    #[error("Number of items is too large to be represented on this platform")]
    Overflow,

    /// `ndarray` shape error.
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

impl Error {
    pub fn read_error(desc: impl Into<String>, error: io::Error) -> Self {
        Error::Read {
            desc: desc.into(),
            error,
        }
    }

    pub fn fetch_error(desc: impl Into<String>, reason: impl fmt::Display) -> Self {
        Error::Fetch {
            desc: desc.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn oov_word(word: &str) -> Self {
        Error::OutOfVocabulary(OutOfVocabulary::Word(word.to_owned()))
    }

    pub(crate) fn oov_index(idx: usize, len: usize) -> Self {
        Error::OutOfVocabulary(OutOfVocabulary::Index { idx, len })
    }

    /// Returns `true` for the recoverable out-of-vocabulary outcome.
    pub fn is_oov(&self) -> bool {
        matches!(self, Error::OutOfVocabulary(_))
    }
}
