//! Readers for the supported vector file formats.

pub mod text;

pub mod word2vec;
