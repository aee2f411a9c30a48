//! Reader for the word2vec binary format.
//!
//! After the shape line, each record consists of the word, terminated
//! by a single space, immediately followed by the vector as `dim`
//! little-endian `f32` values. Newlines in front of a word are
//! ignored, since most writers terminate each vector with a newline.
//!
//! Vectors must be stored as 32-bit floats. This is not verified,
//! a file with 64-bit components decodes to garbage.

use std::io::{self, BufRead, Read};

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};
use crate::io::{Header, ReadRecord, Record};
use crate::util::{capacity_hint, decode_lossy};

/// Record reader for the word2vec binary format.
#[derive(Clone, Copy, Debug, Default)]
pub struct Word2VecFormat;

impl Word2VecFormat {
    fn map_payload_error(e: io::Error, record: usize) -> Error {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::UnexpectedEof { record }
        } else {
            Error::read_error("Cannot read word embedding", e)
        }
    }
}

impl ReadRecord for Word2VecFormat {
    fn read_record<R>(&self, reader: &mut R, header: Header, record: usize) -> Result<Record>
    where
        R: BufRead,
    {
        let word = self.read_word(reader, header, record)?;

        let payload_len = header.payload_len();
        let mut payload = Vec::with_capacity(capacity_hint(payload_len));
        reader
            .by_ref()
            .take(payload_len as u64)
            .read_to_end(&mut payload)
            .map_err(|e| Self::map_payload_error(e, record))?;
        if payload.len() != payload_len {
            return Err(Error::UnexpectedEof { record });
        }

        let embedding = self.decode_vector(&payload, header, record)?;

        Ok((word, embedding))
    }

    fn read_word<R>(&self, reader: &mut R, _header: Header, record: usize) -> Result<String>
    where
        R: BufRead,
    {
        let mut word = Vec::new();

        loop {
            let (done, used) = {
                let available = reader
                    .fill_buf()
                    .map_err(|e| Error::read_error("Cannot read word", e))?;
                if available.is_empty() {
                    return Err(Error::UnexpectedEof { record });
                }

                match available.iter().position(|&b| b == b' ') {
                    Some(sep) => {
                        word.extend(available[..sep].iter().filter(|&&b| b != b'\n'));
                        (true, sep + 1)
                    }
                    None => {
                        word.extend(available.iter().filter(|&&b| b != b'\n'));
                        (false, available.len())
                    }
                }
            };

            reader.consume(used);

            if done {
                return Ok(decode_lossy(&word));
            }
        }
    }

    fn skip_payload<R>(&self, reader: &mut R, header: Header, record: usize) -> Result<()>
    where
        R: BufRead,
    {
        let payload_len = header.payload_len() as u64;
        let skipped = io::copy(&mut reader.by_ref().take(payload_len), &mut io::sink())
            .map_err(|e| Self::map_payload_error(e, record))?;

        if skipped != payload_len {
            return Err(Error::UnexpectedEof { record });
        }

        Ok(())
    }

    fn decode_vector(&self, span: &[u8], header: Header, record: usize) -> Result<Vec<f32>> {
        if span.len() != header.payload_len() {
            return Err(Error::Format(format!(
                "Vector payload of record {} has {} bytes, expected: {}",
                record,
                span.len(),
                header.payload_len()
            )));
        }

        let mut embedding = vec![0f32; header.dim];
        LittleEndian::read_f32_into(span, &mut embedding);
        Ok(embedding)
    }
}
