//! Word embeddings: a vocabulary combined with a storage.

use ndarray::{CowArray, Ix1};

use crate::error::{Error, Result};
use crate::storage::Storage;
use crate::vocab::Vocab;

/// Word embeddings.
///
/// This data structure stores word embeddings (also known as *word
/// vectors*). The vocabulary maps words to rows of the storage.
#[derive(Debug)]
pub struct Embeddings<V, S> {
    vocab: V,
    storage: S,
}

impl<V, S> Embeddings<V, S> {
    /// Construct embeddings from a vocabulary and storage.
    pub fn new(vocab: V, storage: S) -> Self {
        Embeddings { vocab, storage }
    }

    /// Get the vocabulary.
    pub fn vocab(&self) -> &V {
        &self.vocab
    }

    /// Get the embedding storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Decompose embeddings in their vocabulary and storage.
    pub fn into_parts(self) -> (V, S) {
        (self.vocab, self.storage)
    }
}

impl<V, S> Embeddings<V, S>
where
    V: Vocab,
    S: Storage,
{
    /// Return the length (in vector components) of the word embeddings.
    pub fn dims(&self) -> usize {
        self.storage.shape().1
    }

    /// Number of words.
    pub fn len(&self) -> usize {
        self.vocab.words_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the embedding of a word.
    pub fn embedding(&mut self, word: &str) -> Result<CowArray<f32, Ix1>> {
        let idx = self.vocab.idx(word).ok_or_else(|| Error::oov_word(word))?;
        self.storage.embedding(idx)
    }

    /// Get the embedding at index `idx`.
    pub fn embedding_by_index(&mut self, idx: usize) -> Result<CowArray<f32, Ix1>> {
        if idx >= self.len() {
            return Err(Error::oov_index(idx, self.len()));
        }

        self.storage.embedding(idx)
    }

    /// Call `f` for every word and its embedding, in index order.
    ///
    /// Embeddings are visited in increasing index order, which is the
    /// efficient access pattern for every storage.
    pub fn for_each<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&str, CowArray<f32, Ix1>),
    {
        let Embeddings { vocab, storage } = self;
        for (idx, word) in vocab.words().iter().enumerate() {
            f(word, storage.embedding(idx)?);
        }

        Ok(())
    }
}
