use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use ndarray::{Array1, CowArray, Ix1};
use tracing::{debug, trace};

use super::{check_idx, Storage};
use crate::error::{Error, Result};
use crate::io::{Header, ReadRecord, VectorFormat};
use crate::util::{capacity_hint, CountingReader};
use crate::vocab::SimpleVocab;

pub(crate) fn open_file(path: &Path) -> Result<File> {
    File::open(path)
        .map_err(|e| Error::read_error(format!("Cannot open embedding file {:?}", path), e))
}

/// Embeddings read on demand using a table of byte offsets.
///
/// Building the table requires a pass over the file that only
/// decodes words. Every lookup seeks to the record and decodes its
/// vector, nothing is cached between lookups.
///
/// For the text format, `offsets[i]` and `offsets[i + 1]` delimit the
/// line of record `i`. For the binary format, `offsets[i]` is the
/// start of the vector payload of record `i`.
#[derive(Debug)]
pub struct OffsetArray<R = File> {
    read: R,
    format: VectorFormat,
    header: Header,
    offsets: Vec<u64>,
}

impl OffsetArray<File> {
    /// Index the embedding file at `path`.
    pub fn open(path: impl AsRef<Path>, format: VectorFormat) -> Result<(SimpleVocab, Self)> {
        Self::read_with_vocab(open_file(path.as_ref())?, format)
    }
}

impl<R> OffsetArray<R>
where
    R: Read + Seek,
{
    /// Read the header and index the records.
    ///
    /// The reader must be positioned at the start of the file. It is
    /// retained for subsequent lookups.
    pub fn read_with_vocab(read: R, format: VectorFormat) -> Result<(SimpleVocab, Self)> {
        let mut reader = CountingReader::new(BufReader::new(read));
        let header = Header::read(&mut reader)?;

        let mut words = Vec::with_capacity(capacity_hint(header.vocab_size));
        let mut offsets = Vec::with_capacity(capacity_hint(header.vocab_size));

        for idx in 0..header.vocab_size {
            if format == VectorFormat::Text {
                offsets.push(reader.position());
            }

            words.push(format.read_word(&mut reader, header, idx)?);

            if format == VectorFormat::Binary {
                offsets.push(reader.position());
            }

            format.skip_payload(&mut reader, header, idx)?;
        }

        if format == VectorFormat::Text {
            offsets.push(reader.position());
        }

        debug!(
            vocab_size = header.vocab_size,
            dim = header.dim,
            %format,
            "built byte offset table"
        );

        let array = OffsetArray {
            read: reader.into_inner().into_inner(),
            format,
            header,
            offsets,
        };

        Ok((SimpleVocab::new(words), array))
    }

    /// The header of the indexed file.
    pub fn header(&self) -> Header {
        self.header
    }

    fn span(&self, idx: usize) -> (u64, usize) {
        match self.format {
            VectorFormat::Text => (
                self.offsets[idx],
                (self.offsets[idx + 1] - self.offsets[idx]) as usize,
            ),
            VectorFormat::Binary => (self.offsets[idx], self.header.payload_len()),
        }
    }
}

impl<R> Storage for OffsetArray<R>
where
    R: Read + Seek,
{
    fn embedding(&mut self, idx: usize) -> Result<CowArray<f32, Ix1>> {
        check_idx(idx, self.header.vocab_size)?;

        let (start, len) = self.span(idx);
        self.read
            .seek(SeekFrom::Start(start))
            .map_err(|e| Error::read_error("Cannot seek to embedding", e))?;

        let mut span = vec![0u8; len];
        self.read.read_exact(&mut span).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Error::UnexpectedEof { record: idx }
            } else {
                Error::read_error("Cannot read embedding", e)
            }
        })?;

        let embedding = self.format.decode_vector(&span, self.header, idx)?;

        Ok(CowArray::from(Array1::from(embedding)))
    }

    fn shape(&self) -> (usize, usize) {
        (self.header.vocab_size, self.header.dim)
    }
}

/// Embeddings read through a single forward cursor.
///
/// No per-record state is kept. The cursor holds the index of the
/// next unread record and the most recently decoded vector. Looking
/// up the current vector again does not perform I/O, looking up a
/// later record skips the records in between, looking up an earlier
/// record rewinds to the start of the file.
#[derive(Debug)]
pub struct SequentialArray<R = BufReader<File>> {
    reader: R,
    format: VectorFormat,
    header: Header,
    next: usize,
    current_idx: Option<usize>,
    current: Array1<f32>,
    rewinds: usize,
}

impl SequentialArray<BufReader<File>> {
    /// Read the vocabulary of the embedding file at `path`.
    pub fn open(path: impl AsRef<Path>, format: VectorFormat) -> Result<(SimpleVocab, Self)> {
        Self::read_with_vocab(BufReader::new(open_file(path.as_ref())?), format)
    }
}

impl<R> SequentialArray<R>
where
    R: BufRead + Seek,
{
    /// Read the vocabulary and position the cursor at the first record.
    ///
    /// The reader must be positioned at the start of the file.
    pub fn read_with_vocab(mut reader: R, format: VectorFormat) -> Result<(SimpleVocab, Self)> {
        let header = Header::read(&mut reader)?;
        let vocab = SimpleVocab::read_vocab(&mut reader, &format, header)?;

        let mut array = SequentialArray {
            reader,
            format,
            header,
            next: 0,
            current_idx: None,
            current: Array1::zeros(0),
            rewinds: 0,
        };
        array.seek_first_record()?;

        Ok((vocab, array))
    }

    /// Number of times the cursor was rewound for a backward lookup.
    pub fn rewinds(&self) -> usize {
        self.rewinds
    }

    fn seek_first_record(&mut self) -> Result<()> {
        self.reader
            .seek(SeekFrom::Start(0))
            .map_err(|e| Error::read_error("Cannot rewind embedding file", e))?;
        Header::read(&mut self.reader)?;
        self.next = 0;
        Ok(())
    }

    fn advance_to(&mut self, idx: usize) -> Result<()> {
        self.current_idx = None;

        let result = self.read_forward(idx);
        if result.is_err() {
            // The stream position is unknown, force a rewind on the next lookup.
            self.next = usize::MAX;
        }

        result
    }

    fn read_forward(&mut self, idx: usize) -> Result<()> {
        if idx < self.next {
            trace!(idx, next = self.next, "rewinding embedding cursor");
            self.seek_first_record()?;
            self.rewinds += 1;
        }

        while self.next < idx {
            self.format
                .skip_record(&mut self.reader, self.header, self.next)?;
            self.next += 1;
        }

        let (_, embedding) = self.format.read_record(&mut self.reader, self.header, idx)?;
        self.next = idx + 1;
        self.current = Array1::from(embedding);
        self.current_idx = Some(idx);

        Ok(())
    }
}

impl<R> Storage for SequentialArray<R>
where
    R: BufRead + Seek,
{
    fn embedding(&mut self, idx: usize) -> Result<CowArray<f32, Ix1>> {
        check_idx(idx, self.header.vocab_size)?;

        if self.current_idx != Some(idx) {
            self.advance_to(idx)?;
        }

        Ok(CowArray::from(self.current.view()))
    }

    fn shape(&self) -> (usize, usize) {
        (self.header.vocab_size, self.header.dim)
    }
}
