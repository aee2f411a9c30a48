use std::io::BufRead;

use ndarray::{Array2, ArrayView2, CowArray, Ix1};

use super::{check_idx, Storage};
use crate::error::{Error, Result};
use crate::io::{Header, ReadRecord};
use crate::util::capacity_hint;
use crate::vocab::SimpleVocab;

#[cfg(feature = "memmap")]
mod mmap {
    use std::fs::File;
    use std::path::Path;

    use memmap2::{Mmap, MmapMut, MmapOptions};
    use ndarray::{ArrayView2, Axis, CowArray, Ix1, Ix2};
    use tracing::debug;

    use crate::descriptor::{ElementType, ExternalArrayDescriptor};
    use crate::error::{Error, Result};
    use crate::storage::{check_idx, Storage};

    /// Memory-mapped matrix.
    ///
    /// The matrix is a flat file of `rows * cols` elements in the
    /// native byte order. `f32` matrices are accessed without copying,
    /// rows of `f64` matrices are converted on lookup.
    #[derive(Debug)]
    pub struct MmapArray {
        map: Mmap,
        shape: Ix2,
        dtype: ElementType,
    }

    impl MmapArray {
        /// Memory map the array file described by `descriptor`.
        ///
        /// `array_path` overrides the path stored in the descriptor.
        pub fn open_descriptor(
            descriptor: &ExternalArrayDescriptor,
            array_path: Option<&Path>,
        ) -> Result<Self> {
            Self::open(
                descriptor.resolve_array_path(array_path),
                (descriptor.vector_count(), descriptor.dim),
                descriptor.dtype,
            )
        }

        /// Memory map an array file with the given shape and element type.
        pub fn open(
            path: impl AsRef<Path>,
            shape: (usize, usize),
            dtype: ElementType,
        ) -> Result<Self> {
            let path = path.as_ref();
            let (rows, cols) = shape;
            let matrix_len = rows
                .checked_mul(cols)
                .and_then(|len| len.checked_mul(dtype.size()))
                .ok_or(Error::Overflow)?;

            let file = File::open(path).map_err(|e| {
                Error::read_error(format!("Cannot open embedding matrix {:?}", path), e)
            })?;
            let file_len = file
                .metadata()
                .map_err(|e| Error::read_error("Cannot get embedding matrix file size", e))?
                .len();
            if file_len < matrix_len as u64 {
                return Err(Error::Format(format!(
                    "Embedding matrix file has {} bytes, expected at least: {}",
                    file_len, matrix_len
                )));
            }

            let map = if matrix_len == 0 {
                // Zero-length file mappings are not permitted.
                MmapMut::map_anon(1)
                    .and_then(MmapMut::make_read_only)
                    .map_err(|e| Error::read_error("Cannot map empty embedding matrix", e))?
            } else {
                unsafe {
                    MmapOptions::new()
                        .len(matrix_len)
                        .map(&file)
                        .map_err(|e| Error::read_error("Cannot memory map embedding matrix", e))?
                }
            };

            debug!(?path, rows, cols, ?dtype, "memory mapped embedding matrix");

            Ok(MmapArray {
                map,
                shape: Ix2(rows, cols),
                dtype,
            })
        }

        fn view<T>(&self) -> ArrayView2<T> {
            // Alignment is ok, mappings start at a page boundary.
            #[allow(clippy::cast_ptr_alignment)]
            unsafe {
                ArrayView2::from_shape_ptr(self.shape, self.map.as_ptr() as *const T)
            }
        }
    }

    impl Storage for MmapArray {
        fn embedding(&mut self, idx: usize) -> Result<CowArray<f32, Ix1>> {
            check_idx(idx, self.shape[0])?;

            Ok(match self.dtype {
                ElementType::Float32 => {
                    CowArray::from(self.view::<f32>().index_axis_move(Axis(0), idx))
                }
                ElementType::Float64 => {
                    CowArray::from(self.view::<f64>().row(idx).mapv(|v| v as f32))
                }
            })
        }

        fn shape(&self) -> (usize, usize) {
            (self.shape[0], self.shape[1])
        }
    }
}

#[cfg(feature = "memmap")]
pub use mmap::MmapArray;

/// In-memory `ndarray` matrix.
#[derive(Clone, Debug)]
pub struct NdArray {
    inner: Array2<f32>,
}

impl NdArray {
    pub fn new(arr: Array2<f32>) -> Self {
        NdArray { inner: arr }
    }

    /// Decode all records that follow the header.
    ///
    /// The vocabulary and the matrix are filled in the same pass.
    pub fn read_with_vocab<R, F>(
        reader: &mut R,
        format: &F,
        header: Header,
    ) -> Result<(SimpleVocab, Self)>
    where
        R: BufRead,
        F: ReadRecord,
    {
        let matrix_len = header
            .vocab_size
            .checked_mul(header.dim)
            .ok_or(Error::Overflow)?;
        let mut words = Vec::with_capacity(capacity_hint(header.vocab_size));
        let mut data = Vec::with_capacity(capacity_hint(matrix_len));

        for idx in 0..header.vocab_size {
            let (word, embedding) = format.read_record(reader, header, idx)?;
            words.push(word);
            data.extend(embedding);
        }

        let matrix = Array2::from_shape_vec((header.vocab_size, header.dim), data)?;

        Ok((SimpleVocab::new(words), NdArray::new(matrix)))
    }

    /// Get a view of the embedding matrix.
    pub fn view(&self) -> ArrayView2<f32> {
        self.inner.view()
    }
}

impl From<Array2<f32>> for NdArray {
    fn from(arr: Array2<f32>) -> Self {
        NdArray::new(arr)
    }
}

impl From<NdArray> for Array2<f32> {
    fn from(arr: NdArray) -> Self {
        arr.inner
    }
}

impl Storage for NdArray {
    fn embedding(&mut self, idx: usize) -> Result<CowArray<f32, Ix1>> {
        check_idx(idx, self.inner.nrows())?;
        Ok(CowArray::from(self.inner.row(idx)))
    }

    fn shape(&self) -> (usize, usize) {
        self.inner.dim()
    }
}
