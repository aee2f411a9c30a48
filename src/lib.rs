//! A library for reading and looking up word embeddings.
//!
//! wordvecs reads embeddings in the plain text format (one word and its
//! components per line) and in the word2vec binary format. Vectors can
//! be looked up by word or by index. How vectors are held is chosen per
//! embedder: decoded into memory, re-read from disk through an offset
//! table, read with a forward cursor, or memory mapped from an external
//! array file.

pub mod batch;

pub mod compat;

pub mod config;

pub mod descriptor;

pub mod embedder;

pub mod embeddings;

pub mod error;

pub mod fetch;

pub mod io;

pub mod library;

pub mod prelude;

pub mod storage;

pub(crate) mod util;

pub mod vocab;
