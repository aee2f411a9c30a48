//! Embedding vocabularies.

use std::io::BufRead;

use fnv::FnvHashMap;
use tracing::warn;

use crate::error::Result;
use crate::io::{Header, ReadRecord};
use crate::util::capacity_hint;

/// Embedding vocabularies.
#[allow(clippy::len_without_is_empty)]
pub trait Vocab {
    /// Get the index of a token.
    ///
    /// Returns `None` for out-of-vocabulary words.
    fn idx(&self, word: &str) -> Option<usize>;

    /// Get the number of words in the vocabulary.
    fn words_len(&self) -> usize;

    /// Get the words in the vocabulary.
    fn words(&self) -> &[String];

    /// Get the word at index `idx`.
    ///
    /// An index outside the vocabulary is reported and yields `None`.
    fn word(&self, idx: usize) -> Option<&str> {
        let word = self.words().get(idx).map(String::as_str);
        if word.is_none() {
            warn!(
                idx,
                vocab_size = self.words_len(),
                "index out of range for vocabulary"
            );
        }
        word
    }
}

/// Vocabulary without subword units.
///
/// Words keep the order of the vector file. The index of a word is
/// the index of its last occurrence, while `words` retains every
/// occurrence. Vector files are not supposed to contain duplicates,
/// so this only matters for malformed files.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SimpleVocab {
    indices: FnvHashMap<String, usize>,
    words: Vec<String>,
}

impl SimpleVocab {
    /// Construct a new simple vocabulary.
    ///
    /// Words are assigned indices in the given order.
    pub fn new(words: impl Into<Vec<String>>) -> Self {
        let words = words.into();

        let mut indices = FnvHashMap::default();
        indices.reserve(words.len());
        for (idx, word) in words.iter().enumerate() {
            indices.insert(word.clone(), idx);
        }

        SimpleVocab { indices, words }
    }

    /// Read the words of all records that follow the header.
    ///
    /// Vectors are skipped without decoding them.
    pub fn read_vocab<R, F>(reader: &mut R, format: &F, header: Header) -> Result<Self>
    where
        R: BufRead,
        F: ReadRecord,
    {
        let mut words = Vec::with_capacity(capacity_hint(header.vocab_size));
        for idx in 0..header.vocab_size {
            words.push(format.read_word(reader, header, idx)?);
            format.skip_payload(reader, header, idx)?;
        }

        Ok(SimpleVocab::new(words))
    }
}

impl Vocab for SimpleVocab {
    fn idx(&self, word: &str) -> Option<usize> {
        self.indices.get(word).cloned()
    }

    fn words_len(&self) -> usize {
        self.words.len()
    }

    fn words(&self) -> &[String] {
        &self.words
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crate::io::{Header, VectorFormat};
    use crate::tests::{binary_bytes, text_bytes, VECTORS, WORDS};

    use super::{SimpleVocab, Vocab};

    fn test_simple_vocab() -> SimpleVocab {
        let words = vec![
            "this".to_owned(),
            "is".to_owned(),
            "a".to_owned(),
            "test".to_owned(),
        ];

        SimpleVocab::new(words)
    }

    #[test]
    fn lookups() {
        let vocab = test_simple_vocab();
        assert_eq!(vocab.words_len(), 4);
        assert_eq!(vocab.idx("a"), Some(2));
        assert_eq!(vocab.idx("haha"), None);
        assert_eq!(vocab.word(3), Some("test"));
        assert_eq!(vocab.word(1000), None);
    }

    #[test]
    fn duplicate_words_keep_last_index() {
        let vocab = SimpleVocab::new(vec!["a".to_owned(), "b".to_owned(), "a".to_owned()]);
        assert_eq!(vocab.words_len(), 3);
        assert_eq!(vocab.idx("a"), Some(2));
        assert_eq!(vocab.word(0), Some("a"));
    }

    #[test]
    fn reads_vocab_from_both_formats() {
        for (format, data) in &[
            (VectorFormat::Text, text_bytes(WORDS, VECTORS.view())),
            (VectorFormat::Binary, binary_bytes(WORDS, VECTORS.view())),
        ] {
            let mut cursor = Cursor::new(data.clone());
            let header = Header::read(&mut cursor).unwrap();
            let vocab = SimpleVocab::read_vocab(&mut cursor, format, header).unwrap();
            assert_eq!(vocab.words(), WORDS);
            for (idx, word) in WORDS.iter().enumerate() {
                assert_eq!(vocab.idx(word), Some(idx));
            }
        }
    }
}
