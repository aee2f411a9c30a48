//! Embedder: lazily built word embeddings with a uniform lookup interface.
//!
//! Constructing an `Embedder` only stores its configuration. All I/O
//! happens in `Embedder::build`, which fetches a missing file, reads
//! the header and the vocabulary, and prepares the storage strategy:
//!
//! ```no_run
//! use wordvecs::prelude::*;
//!
//! let mut embedder = Embedder::new("wiki.zh.vec", VectorFormat::Text, StorageStrategy::IndexedDisk);
//! embedder.build().unwrap();
//!
//! let by_word = embedder.lookup("薄餡").unwrap().to_owned();
//! let by_index = embedder.lookup(0usize).unwrap().to_owned();
//! ```

use std::fmt;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use ndarray::{CowArray, Ix1};
use tracing::debug;

#[cfg(feature = "memmap")]
use crate::descriptor::ExternalArrayDescriptor;
use crate::embeddings::Embeddings;
use crate::error::{Error, Result};
use crate::fetch::{resolve_url, CommandFetcher, Fetch};
use crate::io::{Header, VectorFormat};
#[cfg(feature = "memmap")]
use crate::storage::MmapArray;
use crate::storage::{
    open_file, NdArray, OffsetArray, SequentialArray, Storage, StorageStrategy, StorageWrap,
};
use crate::vocab::{SimpleVocab, Vocab};

/// Lookup key: a word or an index.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Key<'a> {
    Word(&'a str),
    Index(usize),
}

impl<'a> From<&'a str> for Key<'a> {
    fn from(word: &'a str) -> Self {
        Key::Word(word)
    }
}

impl<'a> From<&'a String> for Key<'a> {
    fn from(word: &'a String) -> Self {
        Key::Word(word)
    }
}

impl<'a> From<usize> for Key<'a> {
    fn from(idx: usize) -> Self {
        Key::Index(idx)
    }
}

/// Word embeddings that are read on `build`.
pub struct Embedder {
    path: PathBuf,
    format: VectorFormat,
    strategy: StorageStrategy,
    array_path: Option<PathBuf>,
    download_url: Option<String>,
    fetcher: Box<dyn Fetch>,
    embeddings: Option<Embeddings<SimpleVocab, StorageWrap>>,
}

impl Embedder {
    /// Embedder for the vector file at `path`.
    ///
    /// For `StorageStrategy::MmapExternal`, `path` is the descriptor
    /// file and `format` is not used.
    pub fn new(path: impl Into<PathBuf>, format: VectorFormat, strategy: StorageStrategy) -> Self {
        Embedder {
            path: path.into(),
            format,
            strategy,
            array_path: None,
            download_url: None,
            fetcher: Box::new(CommandFetcher::default()),
            embeddings: None,
        }
    }

    /// Embedder for an external array described by the descriptor at `path`.
    pub fn mmap_external(path: impl Into<PathBuf>, array_path: Option<PathBuf>) -> Self {
        Embedder::new(path, VectorFormat::Binary, StorageStrategy::MmapExternal)
            .with_array_path(array_path)
    }

    /// Override the array path recorded in the descriptor.
    pub fn with_array_path(mut self, array_path: Option<PathBuf>) -> Self {
        self.array_path = array_path;
        self
    }

    /// Download URL used when the vector file is missing.
    pub fn with_download_url(mut self, url: Option<String>) -> Self {
        self.download_url = url;
        self
    }

    /// Replace the fetcher for missing vector files.
    pub fn with_fetcher(mut self, fetcher: Box<dyn Fetch>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Read the embeddings.
    ///
    /// Calling `build` on a built embedder does nothing.
    pub fn build(&mut self) -> Result<()> {
        if self.embeddings.is_some() {
            return Ok(());
        }

        if self.strategy != StorageStrategy::MmapExternal && !self.path.exists() {
            let url = resolve_url(&self.path, self.download_url.as_deref())?;
            self.fetcher.fetch(&url, &self.path)?;
        }

        let (vocab, storage) = match self.strategy {
            StorageStrategy::InMemory => {
                let f = open_file(&self.path)?;
                let mut reader = BufReader::new(f);
                let header = Header::read(&mut reader)?;
                let (vocab, storage) = NdArray::read_with_vocab(&mut reader, &self.format, header)?;
                (vocab, StorageWrap::from(storage))
            }
            StorageStrategy::IndexedDisk => {
                let (vocab, storage) = OffsetArray::open(&self.path, self.format)?;
                (vocab, StorageWrap::from(storage))
            }
            StorageStrategy::SequentialDisk => {
                let (vocab, storage) = SequentialArray::open(&self.path, self.format)?;
                (vocab, StorageWrap::from(storage))
            }
            StorageStrategy::MmapExternal => self.open_external()?,
        };

        debug!(
            path = ?self.path,
            strategy = %self.strategy,
            vocab_size = vocab.words_len(),
            dim = storage.shape().1,
            "built embedder"
        );

        self.embeddings = Some(Embeddings::new(vocab, storage));

        Ok(())
    }

    #[cfg(feature = "memmap")]
    fn open_external(&self) -> Result<(SimpleVocab, StorageWrap)> {
        let descriptor = ExternalArrayDescriptor::read(&self.path)?;
        let storage = MmapArray::open_descriptor(&descriptor, self.array_path.as_deref())?;
        Ok((SimpleVocab::new(descriptor.words), storage.into()))
    }

    #[cfg(not(feature = "memmap"))]
    fn open_external(&self) -> Result<(SimpleVocab, StorageWrap)> {
        Err(Error::Format(String::from(
            "Memory mapping support is not enabled",
        )))
    }

    /// Release the file handle or memory map.
    ///
    /// A subsequent `build` reads the embeddings again.
    pub fn close(&mut self) {
        self.embeddings = None;
    }

    /// Returns `true` after a successful `build`.
    pub fn is_built(&self) -> bool {
        self.embeddings.is_some()
    }

    /// The built embeddings.
    pub fn embeddings(&self) -> Option<&Embeddings<SimpleVocab, StorageWrap>> {
        self.embeddings.as_ref()
    }

    fn embeddings_mut(&mut self) -> Result<&mut Embeddings<SimpleVocab, StorageWrap>> {
        self.embeddings.as_mut().ok_or(Error::NotBuilt)
    }

    /// Look up the vector of a word or index.
    pub fn lookup<'a>(&mut self, key: impl Into<Key<'a>>) -> Result<CowArray<f32, Ix1>> {
        match key.into() {
            Key::Word(word) => self.lookup_by_word(word),
            Key::Index(idx) => self.lookup_by_index(idx),
        }
    }

    /// Look up the vector of a word.
    pub fn lookup_by_word(&mut self, word: &str) -> Result<CowArray<f32, Ix1>> {
        self.embeddings_mut()?.embedding(word)
    }

    /// Look up the vector at index `idx`.
    pub fn lookup_by_index(&mut self, idx: usize) -> Result<CowArray<f32, Ix1>> {
        self.embeddings_mut()?.embedding_by_index(idx)
    }

    /// Vocabulary size, zero before `build`.
    pub fn vocab_size(&self) -> usize {
        self.embeddings.as_ref().map(Embeddings::len).unwrap_or(0)
    }

    /// Vector dimensionality, zero before `build`.
    pub fn dim(&self) -> usize {
        self.embeddings.as_ref().map(Embeddings::dims).unwrap_or(0)
    }

    /// Index of a word, `None` for unknown words.
    pub fn index_of(&self, word: &str) -> Option<usize> {
        self.embeddings.as_ref()?.vocab().idx(word)
    }

    /// Word at `idx`, `None` when the index is out of range.
    pub fn word_of(&self, idx: usize) -> Option<&str> {
        self.embeddings.as_ref()?.vocab().word(idx)
    }

    /// Words in index order, empty before `build`.
    pub fn words(&self) -> &[String] {
        self.embeddings
            .as_ref()
            .map(|embeddings| embeddings.vocab().words())
            .unwrap_or(&[])
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn strategy(&self) -> StorageStrategy {
        self.strategy
    }

    /// Format of the vector file, `None` for external arrays.
    pub fn format(&self) -> Option<VectorFormat> {
        match self.strategy {
            StorageStrategy::MmapExternal => None,
            _ => Some(self.format),
        }
    }
}

impl fmt::Debug for Embedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Embedder")
            .field("path", &self.path)
            .field("format", &self.format())
            .field("strategy", &self.strategy)
            .field("array_path", &self.array_path)
            .field("built", &self.is_built())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::rc::Rc;

    use byteorder::{LittleEndian, WriteBytesExt};
    use tempfile::TempDir;

    use super::{Embedder, Key};
    use crate::error::{Error, Result};
    use crate::fetch::Fetch;
    use crate::io::VectorFormat;
    use crate::storage::StorageStrategy;
    use crate::tests::{binary_bytes, text_bytes, write_fixtures, Fixtures, VECTORS, WORDS};

    const STRATEGIES: &[StorageStrategy] = &[
        StorageStrategy::InMemory,
        StorageStrategy::IndexedDisk,
        StorageStrategy::SequentialDisk,
    ];

    fn all_embedders(fixtures: &Fixtures) -> Vec<Embedder> {
        let mut embedders = Vec::new();
        for &strategy in STRATEGIES {
            embedders.push(Embedder::new(&fixtures.text, VectorFormat::Text, strategy));
            embedders.push(Embedder::new(&fixtures.binary, VectorFormat::Binary, strategy));
        }

        #[cfg(feature = "memmap")]
        embedders.push(Embedder::mmap_external(&fixtures.descriptor, None));

        embedders
    }

    struct FakeFetcher {
        calls: Rc<Cell<usize>>,
    }

    impl Fetch for FakeFetcher {
        fn fetch(&self, _url: &str, path: &Path) -> Result<()> {
            self.calls.set(self.calls.get() + 1);
            fs::write(path, text_bytes(WORDS, VECTORS.view())).unwrap();
            Ok(())
        }
    }

    #[test]
    fn word_and_index_lookups_agree() {
        let dir = TempDir::new().unwrap();
        let fixtures = write_fixtures(dir.path());

        for mut embedder in all_embedders(&fixtures) {
            embedder.build().unwrap();
            assert_eq!(embedder.vocab_size(), 5);
            assert_eq!(embedder.dim(), 3);
            assert_eq!(embedder.words(), WORDS);

            for idx in 0..embedder.vocab_size() {
                let word = embedder.word_of(idx).unwrap().to_owned();
                assert_eq!(embedder.index_of(&word), Some(idx));

                let by_word = embedder.lookup_by_word(&word).unwrap().to_owned();
                let by_index = embedder.lookup_by_index(idx).unwrap().to_owned();
                assert_eq!(by_word, by_index);
                assert_eq!(by_word.view(), VECTORS.row(idx));
            }
        }
    }

    #[test]
    fn unknown_keys_are_oov() {
        let dir = TempDir::new().unwrap();
        let fixtures = write_fixtures(dir.path());

        for mut embedder in all_embedders(&fixtures) {
            embedder.build().unwrap();
            assert!(embedder.lookup("Z").unwrap_err().is_oov());
            assert!(embedder.lookup(5usize).unwrap_err().is_oov());
            assert_eq!(embedder.index_of("Z"), None);
            assert_eq!(embedder.word_of(5), None);

            // Failed lookups do not disturb later ones.
            assert_eq!(embedder.lookup(4usize).unwrap().view(), VECTORS.row(4));
        }
    }

    #[test]
    fn random_access_pattern() {
        let dir = TempDir::new().unwrap();
        let fixtures = write_fixtures(dir.path());

        for mut embedder in all_embedders(&fixtures) {
            embedder.build().unwrap();
            for &idx in &[4usize, 0, 3, 3, 1, 4, 2, 0] {
                assert_eq!(embedder.lookup(idx).unwrap().view(), VECTORS.row(idx));
            }
        }
    }

    #[test]
    fn key_conversions() {
        let word = String::from("C");
        assert_eq!(Key::from("C"), Key::Word("C"));
        assert_eq!(Key::from(&word), Key::Word("C"));
        assert_eq!(Key::from(2usize), Key::Index(2));
    }

    #[test]
    fn lookups_before_build_fail() {
        let dir = TempDir::new().unwrap();
        let fixtures = write_fixtures(dir.path());
        let mut embedder = Embedder::new(&fixtures.text, VectorFormat::Text, StorageStrategy::InMemory);

        assert!(!embedder.is_built());
        assert!(matches!(embedder.lookup("A"), Err(Error::NotBuilt)));
        assert!(matches!(embedder.lookup(0usize), Err(Error::NotBuilt)));
        assert_eq!(embedder.vocab_size(), 0);
        assert_eq!(embedder.dim(), 0);
        assert_eq!(embedder.index_of("A"), None);
        assert_eq!(embedder.word_of(0), None);
        assert!(embedder.words().is_empty());
    }

    #[test]
    fn build_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let fixtures = write_fixtures(dir.path());

        for mut embedder in all_embedders(&fixtures) {
            embedder.build().unwrap();
            embedder.build().unwrap();
            assert_eq!(embedder.vocab_size(), 5);
        }

        // A second build does not touch the file.
        let mut embedder =
            Embedder::new(&fixtures.binary, VectorFormat::Binary, StorageStrategy::InMemory);
        embedder.build().unwrap();
        fs::remove_file(&fixtures.binary).unwrap();
        embedder.build().unwrap();
        assert_eq!(embedder.lookup("B").unwrap().view(), VECTORS.row(1));
    }

    #[test]
    fn close_releases_embeddings() {
        let dir = TempDir::new().unwrap();
        let fixtures = write_fixtures(dir.path());
        let mut embedder =
            Embedder::new(&fixtures.text, VectorFormat::Text, StorageStrategy::IndexedDisk);
        embedder.build().unwrap();
        embedder.close();
        assert!(matches!(embedder.lookup(0usize), Err(Error::NotBuilt)));

        embedder.build().unwrap();
        assert_eq!(embedder.lookup(0usize).unwrap().view(), VECTORS.row(0));
    }

    #[test]
    fn missing_file_is_fetched_once() {
        let dir = TempDir::new().unwrap();
        let path: PathBuf = dir.path().join("fetched.vec");
        let calls = Rc::new(Cell::new(0));

        let mut embedder = Embedder::new(&path, VectorFormat::Text, StorageStrategy::SequentialDisk)
            .with_download_url(Some("http://example.com/fetched.vec.gz".to_owned()))
            .with_fetcher(Box::new(FakeFetcher {
                calls: calls.clone(),
            }));

        embedder.build().unwrap();
        embedder.build().unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(embedder.lookup("D").unwrap().view(), VECTORS.row(3));
    }

    #[test]
    fn missing_file_without_url_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wordvecs-embedder-unset.vec");
        let mut embedder = Embedder::new(&path, VectorFormat::Text, StorageStrategy::InMemory);
        assert!(matches!(embedder.build(), Err(Error::Fetch { .. })));
        assert!(!embedder.is_built());
    }

    #[test]
    fn malformed_header_fails_build() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.vec");
        fs::write(&path, b"5\nA 1 2 3\n").unwrap();

        for &strategy in STRATEGIES {
            let mut embedder = Embedder::new(&path, VectorFormat::Text, strategy);
            assert!(matches!(embedder.build(), Err(Error::Format(_))));
            assert!(!embedder.is_built());
        }
    }

    #[test]
    fn oversized_header_counts_fail_build() {
        let dir = TempDir::new().unwrap();
        let record = binary_bytes(&["A"], VECTORS.slice(ndarray::s![..1, ..]));

        let mut sources = Vec::new();
        let headers: &[(&str, &[u8])] = &[
            ("vocab", b"4611686018427387904 3\n"),
            ("dim", b"1 4611686018427387904\n"),
        ];
        for &(name, header) in headers {
            let text = dir.path().join(format!("{}.vec", name));
            fs::write(&text, [header, &b"A 0.1 0.2 0.3\n"[..]].concat()).unwrap();
            sources.push((text, VectorFormat::Text));

            let binary = dir.path().join(format!("{}.bin", name));
            fs::write(&binary, [header, &record[4..]].concat()).unwrap();
            sources.push((binary, VectorFormat::Binary));
        }

        for (path, format) in &sources {
            for &strategy in STRATEGIES {
                let mut embedder = Embedder::new(path, *format, strategy);
                assert!(embedder.build().is_err());
                assert!(!embedder.is_built());
            }
        }
    }

    #[test]
    fn undecodable_words_become_empty() {
        let dir = TempDir::new().unwrap();

        let text = dir.path().join("undecodable.vec");
        fs::write(&text, b"2 3\n\xff\xfe 1 2 3\nB 4 5 6\n").unwrap();

        let binary = dir.path().join("undecodable.bin");
        let mut data = b"2 3\n".to_vec();
        let records: &[(&[u8], [f32; 3])] = &[(b"\xff\xfe", [1., 2., 3.]), (b"B", [4., 5., 6.])];
        for (word, vector) in records {
            data.extend_from_slice(word);
            data.push(b' ');
            for &v in vector {
                data.write_f32::<LittleEndian>(v).unwrap();
            }
            data.push(b'\n');
        }
        fs::write(&binary, data).unwrap();

        for (path, format) in &[(text, VectorFormat::Text), (binary, VectorFormat::Binary)] {
            for &strategy in STRATEGIES {
                let mut embedder = Embedder::new(path, *format, strategy);
                embedder.build().unwrap();
                assert_eq!(embedder.vocab_size(), 2);
                assert_eq!(embedder.word_of(0), Some(""));
                assert_eq!(embedder.index_of(""), Some(0));
                assert_eq!(embedder.lookup_by_index(0).unwrap().to_vec(), vec![1f32, 2., 3.]);
                assert_eq!(embedder.lookup("B").unwrap().to_vec(), vec![4f32, 5., 6.]);
            }
        }
    }

    #[test]
    fn duplicate_words_resolve_to_last_index() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("duplicates.vec");
        fs::write(&path, text_bytes(&["A", "B", "A"], VECTORS.slice(ndarray::s![..3, ..]))).unwrap();

        for &strategy in STRATEGIES {
            let mut embedder = Embedder::new(&path, VectorFormat::Text, strategy);
            embedder.build().unwrap();
            assert_eq!(embedder.vocab_size(), 3);
            assert_eq!(embedder.index_of("A"), Some(2));
            assert_eq!(embedder.word_of(0), Some("A"));
            assert_eq!(embedder.lookup("A").unwrap().view(), VECTORS.row(2));
            assert_eq!(embedder.lookup(0usize).unwrap().view(), VECTORS.row(0));
        }
    }

    #[test]
    fn external_arrays_have_no_format() {
        let embedder = Embedder::mmap_external("vectors.toml", None);
        assert_eq!(embedder.format(), None);
        assert!(format!("{:?}", embedder).contains("format: None"));

        let embedder = Embedder::new("vectors.bin", VectorFormat::Binary, StorageStrategy::InMemory);
        assert_eq!(embedder.format(), Some(VectorFormat::Binary));
        assert!(format!("{:?}", embedder).contains("format: Some(Binary)"));
    }

    #[cfg(feature = "memmap")]
    #[test]
    fn external_array_path_override() {
        let dir = TempDir::new().unwrap();
        let fixtures = write_fixtures(dir.path());
        let moved = dir.path().join("moved.f32");
        fs::rename(dir.path().join("vectors.f32"), &moved).unwrap();

        let mut embedder = Embedder::mmap_external(&fixtures.descriptor, None);
        assert!(embedder.build().is_err());

        let mut embedder = Embedder::mmap_external(&fixtures.descriptor, Some(moved));
        embedder.build().unwrap();
        assert_eq!(embedder.lookup("E").unwrap().view(), VECTORS.row(4));
    }
}
