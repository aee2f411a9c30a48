//! Vector file formats and record readers.
//!
//! Two formats are supported, both starting with a header line holding
//! the vocabulary size and the vector dimensionality:
//!
//! * `VectorFormat::Text`: one record per line, a word followed by its
//!   vector components as space-separated decimal numbers.
//! * `VectorFormat::Binary`: the word2vec binary format, a word terminated
//!   by a space followed by the raw little-endian `f32` components.
//!
//! The `ReadRecord` trait provides the operations that the storage
//! strategies need: full record decoding, word-only decoding (used to
//! build vocabularies and offset tables) and decoding of a single
//! vector payload that was read by offset.

use std::fmt;
use std::io::BufRead;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::compat::text::TextFormat;
use crate::compat::word2vec::Word2VecFormat;
use crate::error::{Error, Result};
use crate::util::{decode_lossy, read_line_bytes};

/// Shape of the embedding matrix, read from the first line of a file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Header {
    pub vocab_size: usize,
    pub dim: usize,
}

impl Header {
    /// Read the header line.
    ///
    /// The line must consist of two whitespace-separated non-negative
    /// integers. The dimensionality must be positive.
    pub fn read<R>(reader: &mut R) -> Result<Self>
    where
        R: BufRead,
    {
        let mut buf = Vec::new();
        if !read_line_bytes(reader, &mut buf)? {
            return Err(Error::Format(String::from("Missing header line")));
        }

        Self::parse(&decode_lossy(&buf))
    }

    fn parse(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let vocab_size = parse_shape_component(parts.next(), "vocabulary size")?;
        let dim = parse_shape_component(parts.next(), "dimensionality")?;

        if let Some(extra) = parts.next() {
            return Err(Error::Format(format!(
                "Spurious header component: '{}'",
                extra
            )));
        }

        if dim == 0 {
            return Err(Error::Format(String::from(
                "Embedding dimensionality must be positive",
            )));
        }

        // Binary payload lengths must be representable.
        if dim.checked_mul(std::mem::size_of::<f32>()).is_none() {
            return Err(Error::Overflow);
        }

        Ok(Header { vocab_size, dim })
    }

    /// Number of bytes of a binary vector payload.
    pub fn payload_len(&self) -> usize {
        self.dim * std::mem::size_of::<f32>()
    }
}

fn parse_shape_component(part: Option<&str>, name: &str) -> Result<usize> {
    let part = part.ok_or_else(|| Error::Format(format!("Header lacks the {}", name)))?;
    part.parse().map_err(|e| {
        Error::Format(format!(
            "Cannot parse shape component '{}' ({}): {}",
            part, name, e
        ))
    })
}

/// Layout of a vector file.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorFormat {
    /// Whitespace-delimited text.
    Text,

    /// word2vec binary: text words, raw `f32` vectors.
    Binary,
}

impl FromStr for VectorFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(VectorFormat::Text),
            "binary" => Ok(VectorFormat::Binary),
            unknown => Err(Error::Format(format!("Unknown vector format: {}", unknown))),
        }
    }
}

impl fmt::Display for VectorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VectorFormat::Text => write!(f, "text"),
            VectorFormat::Binary => write!(f, "binary"),
        }
    }
}

/// Word and vector of a single record.
pub type Record = (String, Vec<f32>);

/// Record-level access to a vector file.
///
/// All methods expect the reader to be positioned at the start of
/// record `record` (the index is only used for error messages). After
/// a successful call, the reader is positioned at the start of the
/// next record.
pub trait ReadRecord {
    /// Read the word and the vector of the next record.
    fn read_record<R>(&self, reader: &mut R, header: Header, record: usize) -> Result<Record>
    where
        R: BufRead;

    /// Read the word of the next record, skipping its vector.
    ///
    /// In the binary format, the reader is positioned at the start of
    /// the vector payload when this method returns. Use
    /// `ReadRecord::skip_payload` to move to the next record.
    fn read_word<R>(&self, reader: &mut R, header: Header, record: usize) -> Result<String>
    where
        R: BufRead;

    /// Skip the payload that follows a word read by `read_word`.
    fn skip_payload<R>(&self, reader: &mut R, header: Header, record: usize) -> Result<()>
    where
        R: BufRead;

    /// Decode the vector from a span of bytes read by offset.
    ///
    /// For the text format the span is the full record line, for the
    /// binary format it is the vector payload.
    fn decode_vector(&self, span: &[u8], header: Header, record: usize) -> Result<Vec<f32>>;

    /// Skip a full record.
    fn skip_record<R>(&self, reader: &mut R, header: Header, record: usize) -> Result<()>
    where
        R: BufRead,
    {
        self.read_word(reader, header, record)?;
        self.skip_payload(reader, header, record)
    }
}

impl ReadRecord for VectorFormat {
    fn read_record<R>(&self, reader: &mut R, header: Header, record: usize) -> Result<Record>
    where
        R: BufRead,
    {
        match self {
            VectorFormat::Text => TextFormat.read_record(reader, header, record),
            VectorFormat::Binary => Word2VecFormat.read_record(reader, header, record),
        }
    }

    fn read_word<R>(&self, reader: &mut R, header: Header, record: usize) -> Result<String>
    where
        R: BufRead,
    {
        match self {
            VectorFormat::Text => TextFormat.read_word(reader, header, record),
            VectorFormat::Binary => Word2VecFormat.read_word(reader, header, record),
        }
    }

    fn skip_payload<R>(&self, reader: &mut R, header: Header, record: usize) -> Result<()>
    where
        R: BufRead,
    {
        match self {
            VectorFormat::Text => TextFormat.skip_payload(reader, header, record),
            VectorFormat::Binary => Word2VecFormat.skip_payload(reader, header, record),
        }
    }

    fn decode_vector(&self, span: &[u8], header: Header, record: usize) -> Result<Vec<f32>> {
        match self {
            VectorFormat::Text => TextFormat.decode_vector(span, header, record),
            VectorFormat::Binary => Word2VecFormat.decode_vector(span, header, record),
        }
    }
}
