use std::io::{self, BufRead, Read};
use std::str;

use ndarray::ArrayViewMut1;

use crate::error::{Error, Result};

/// Reader that keeps track of the number of bytes consumed.
///
/// Used to record byte offsets while making a pass over a vector
/// file, without querying the underlying file position.
pub struct CountingReader<R> {
    inner: R,
    pos: u64,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        CountingReader { inner, pos: 0 }
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R> Read for CountingReader<R>
where
    R: Read,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R> BufRead for CountingReader<R>
where
    R: BufRead,
{
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt);
        self.pos += amt as u64;
    }
}

/// Largest capacity reserved up front from a count in a file header.
const MAX_PREALLOC: usize = 1 << 16;

/// Capacity to reserve for `n` items announced by a file header.
///
/// Header counts are not trusted, buffers grow as records are read.
pub fn capacity_hint(n: usize) -> usize {
    n.min(MAX_PREALLOC)
}

/// Decode UTF-8, dropping invalid byte sequences.
pub fn decode_lossy(mut bytes: &[u8]) -> String {
    let mut decoded = String::with_capacity(bytes.len());

    loop {
        match str::from_utf8(bytes) {
            Ok(valid) => {
                decoded.push_str(valid);
                return decoded;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                // Safety: `valid_up_to` is the length of the valid prefix.
                decoded.push_str(unsafe { str::from_utf8_unchecked(valid) });
                let invalid_len = e.error_len().unwrap_or_else(|| rest.len());
                bytes = &rest[invalid_len..];
            }
        }
    }
}

/// Read a single line, including its newline, into `buf`.
///
/// Returns `false` when the stream is exhausted.
pub fn read_line_bytes<R>(reader: &mut R, buf: &mut Vec<u8>) -> Result<bool>
where
    R: BufRead,
{
    buf.clear();
    let n = reader
        .read_until(b'\n', buf)
        .map_err(|e| Error::read_error("Cannot read line from embedding file", e))?;
    Ok(n != 0)
}

pub fn l2_normalize(mut v: ArrayViewMut1<f32>) -> f32 {
    let norm = v.dot(&v).sqrt();

    if norm != 0. {
        v /= norm;
    }

    norm
}
