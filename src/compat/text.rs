//! Reader for the text format with dimensions.
//!
//! The first line contains the shape of the embedding matrix:
//!
//! *vocab_size n_components*
//!
//! The remainder of the stream contains one word embedding per line in
//! the following format:
//!
//! *word0 component_1 component_2 ... component_n*
//!
//! Lines are decoded leniently: invalid UTF-8 sequences are dropped
//! rather than failing the read. Trailing whitespace of a line (e.g.
//! the trailing space written by fastText) is ignored.

use std::io::BufRead;

use crate::error::{Error, Result};
use crate::io::{Header, ReadRecord, Record};
use crate::util::{capacity_hint, decode_lossy, read_line_bytes};

/// Record reader for the text format.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextFormat;

impl TextFormat {
    fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>, header: Header, record: usize) -> Result<()>
    where
        R: BufRead,
    {
        if read_line_bytes(reader, buf)? {
            Ok(())
        } else {
            Err(Error::Format(format!(
                "Incorrect vocabulary size, expected: {}, got: {}",
                header.vocab_size, record
            )))
        }
    }

    /// Split a line in its word and vector components.
    fn parse_line(line: &str, header: Header, record: usize) -> Result<Record> {
        let mut parts = line.trim_end().split(' ');

        // `split` always yields at least one (possibly empty) part.
        let word = parts.next().unwrap_or_default();

        let mut embedding = Vec::with_capacity(capacity_hint(header.dim));
        for part in parts {
            embedding.push(part.parse::<f32>().map_err(|e| {
                Error::Format(format!(
                    "Cannot parse vector component '{}' of record {}: {}",
                    part, record, e
                ))
            })?);
        }

        if embedding.len() != header.dim {
            return Err(Error::Format(format!(
                "Incorrect embedding dimensionality for record {}, expected: {}, got: {}",
                record,
                header.dim,
                embedding.len()
            )));
        }

        Ok((word.to_owned(), embedding))
    }
}

impl ReadRecord for TextFormat {
    fn read_record<R>(&self, reader: &mut R, header: Header, record: usize) -> Result<Record>
    where
        R: BufRead,
    {
        let mut buf = Vec::new();
        Self::read_line(reader, &mut buf, header, record)?;
        Self::parse_line(&decode_lossy(&buf), header, record)
    }

    fn read_word<R>(&self, reader: &mut R, header: Header, record: usize) -> Result<String>
    where
        R: BufRead,
    {
        let mut buf = Vec::new();
        Self::read_line(reader, &mut buf, header, record)?;

        let word_len = buf
            .iter()
            .position(|&b| b == b' ' || b == b'\n' || b == b'\r')
            .unwrap_or_else(|| buf.len());
        Ok(decode_lossy(&buf[..word_len]))
    }

    fn skip_payload<R>(&self, _reader: &mut R, _header: Header, _record: usize) -> Result<()>
    where
        R: BufRead,
    {
        // The vector is on the line consumed by `read_word`.
        Ok(())
    }

    fn decode_vector(&self, span: &[u8], header: Header, record: usize) -> Result<Vec<f32>> {
        Self::parse_line(&decode_lossy(span), header, record).map(|(_, embedding)| embedding)
    }
}
