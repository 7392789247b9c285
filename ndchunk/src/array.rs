//! N-dimensional chunked arrays.
//!
//! An [`Array`] is defined by the following parameters:
//!  - **itemsize**: the size of an element in bytes,
//!  - **shape**: the extent of each of the (up to [`MAX_DIM`](crate::MAX_DIM)) dimensions,
//!  - **storage**: either [chunked](Storage::Chunked) with a chunk shape and block shape, or a [plain buffer](Storage::PlainBuffer).
//!
//! A chunked array is tiled by a regular grid of chunks.
//! The grid covers the *extended shape*, the shape rounded up to a multiple of the chunk shape, so chunks at the upper edges carry padding.
//! Chunks are numbered in row-major order over the grid, and the contents of a chunk are row-major over the chunk shape.
//!
//! The lifecycle of an array is `empty -> filling -> filled`:
//!  - [`Array::empty`] creates an array with no written chunks,
//!  - [`Array::append`] writes the next chunk in grid order,
//!  - once every chunk has been written, the array is [filled](Array::filled) and further appends fail with [`ErrorKind::ContainerFilled`].
//!
//! [`Array::from_buffer`], [`Array::copy`], and [`Array::get_slice`] fill an array in one step.

mod array_elements;
mod array_errors;
mod array_frame;
mod array_layout;
mod array_params;
mod array_slice;
mod backend;

use std::sync::Arc;

use ndchunk_codec::CodecConfiguration;

pub use self::array_errors::{ArrayError, ErrorKind};
pub(crate) use self::array_layout::ArrayLayout;
pub use self::array_params::{ArrayParams, ChunkedStorage, Storage};
pub use self::backend::BackendKind;
use self::backend::{ArrayBackend, RegionReader, new_backend};
use crate::array_subset::{ArraySubset, copy_region};
use crate::context::Context;
use crate::dims::Dims;

/// An N-dimensional chunked array.
///
/// An array holds a reference to the [`Context`] it was created with.
/// Buffers allocated through the context allocator are released back to it when the array is dropped.
#[derive(Debug)]
pub struct Array {
    context: Arc<Context>,
    layout: ArrayLayout,
    backend: Box<dyn ArrayBackend>,
    nparts: u64,
    filled: bool,
}

impl Array {
    /// Create an empty array.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - the item size is zero or the rank is zero,
    ///  - the chunk shape or block shape of chunked storage does not match the rank of the array, contains a zero, or the block shape exceeds the chunk shape, or
    ///  - the plain buffer cannot be allocated.
    pub fn empty(
        context: &Arc<Context>,
        params: &ArrayParams,
        storage: &Storage,
    ) -> Result<Self, ArrayError> {
        let layout = match storage {
            Storage::Chunked(chunked) => {
                let layout = ArrayLayout::new(
                    params.itemsize,
                    params.shape,
                    chunked.chunkshape,
                    chunked.blockshape,
                )?;
                if chunked.blockshape != chunked.chunkshape && !context.codec().supports_blocks() {
                    log::warn!(
                        "the block shape {} differs from the chunk shape {}, but the {} codec does not encode blocks",
                        chunked.blockshape,
                        chunked.chunkshape,
                        context.codec().identifier()
                    );
                }
                layout
            }
            Storage::PlainBuffer => ArrayLayout::new_plain(params.itemsize, params.shape)?,
        };
        let backend = new_backend(context, &layout, storage)?;
        log::debug!(
            "created an empty {} array with shape {}, chunk shape {}, and item size {}",
            backend.kind(),
            layout.shape(),
            layout.chunkshape(),
            layout.itemsize()
        );
        Ok(Self {
            context: context.clone(),
            layout,
            backend,
            nparts: 0,
            filled: false,
        })
    }

    /// Create an array filled with the row-major contents of `buffer`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - the array cannot be [created](Array::empty),
    ///  - the length of `buffer` is not the size of the array in bytes, or
    ///  - a chunk cannot be encoded.
    pub fn from_buffer(
        context: &Arc<Context>,
        params: &ArrayParams,
        storage: &Storage,
        buffer: &[u8],
    ) -> Result<Self, ArrayError> {
        let mut array = Self::empty(context, params, storage)?;
        let expected = array.layout.size_bytes();
        if buffer.len() != expected {
            return Err(ArrayError::InvalidBytesInputSize(
                buffer.len(),
                expected as u64,
            ));
        }
        let shape = array.layout.shape().to_vec();
        let itemsize = array.itemsize();
        let reader = |region: &ArraySubset,
                      dest: &mut [u8],
                      dest_shape: &[u64]|
         -> Result<(), ArrayError> {
            copy_region(
                buffer,
                &shape,
                region,
                dest,
                dest_shape,
                &vec![0; dest_shape.len()],
                itemsize,
            );
            Ok(())
        };
        array.fill_with(array.layout.clone(), &reader)?;
        Ok(array)
    }

    /// Append the next chunk of the array in row-major chunk-grid order.
    ///
    /// `chunk` holds the row-major contents of the full chunk shape, including any padding beyond the array shape.
    /// A plain buffer array has one chunk spanning the whole array.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - the length of `chunk` is not the size of a chunk in bytes,
    ///  - the array is already filled, or
    ///  - the chunk cannot be encoded or the array cannot be persisted once filled.
    ///
    /// The array is unchanged if the chunk is rejected or the filled array cannot be persisted.
    pub fn append(&mut self, chunk: &[u8]) -> Result<(), ArrayError> {
        let expected = self.layout.chunk_size_bytes();
        if chunk.len() != expected {
            return Err(ArrayError::InvalidBytesInputSize(
                chunk.len(),
                expected as u64,
            ));
        }
        if self.filled || self.nparts >= self.nchunks() {
            return Err(ArrayError::ContainerFilled {
                nchunks: self.nchunks(),
            });
        }
        let index = self.nparts;
        self.backend
            .append(&self.context, &self.layout, index, chunk)?;
        let filled = index + 1 == self.nchunks();
        if filled {
            if let Err(err) = self.backend.finalize(&self.layout) {
                self.backend.discard_chunk(index);
                return Err(err);
            }
            log::debug!("filled the array with {} chunks", index + 1);
        }
        self.nparts = index + 1;
        self.filled = filled;
        Ok(())
    }

    /// Write the row-major contents of the array to `buffer`.
    ///
    /// Chunk padding is not included.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - the length of `buffer` is not the size of the array in bytes,
    ///  - a chunk of a chunked array has not been written, or
    ///  - a chunk cannot be decoded.
    pub fn to_buffer(&self, buffer: &mut [u8]) -> Result<(), ArrayError> {
        let expected = self.layout.size_bytes();
        if buffer.len() != expected {
            return Err(ArrayError::InvalidBytesInputSize(
                buffer.len(),
                expected as u64,
            ));
        }
        let shape = self.layout.shape().to_vec();
        self.backend.read_region(
            &self.context,
            &self.layout,
            &ArraySubset::new_with_shape(shape.clone()),
            buffer,
            &shape,
        )
    }

    /// Return the row-major contents of the array.
    ///
    /// # Errors
    /// See [`Array::to_buffer`].
    pub fn to_vec(&self) -> Result<Vec<u8>, ArrayError> {
        let mut buffer = vec![0; self.layout.size_bytes()];
        self.to_buffer(&mut buffer)?;
        Ok(buffer)
    }

    /// Remove the dimensions with an extent of one.
    ///
    /// The dimensions are removed from the shape, chunk shape, block shape, and extended shape.
    /// If every dimension has an extent of one, the last dimension is kept.
    /// The contents of the array are unchanged.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if written chunks cannot be re-encoded or the array cannot be persisted.
    pub fn squeeze(&mut self) -> Result<(), ArrayError> {
        let ndim = self.ndim();
        let mut keep: Vec<usize> = (0..ndim)
            .filter(|&i| self.layout.shape()[i] != 1)
            .collect();
        if keep.is_empty() {
            keep.push(ndim - 1);
        }
        if keep.len() == ndim {
            return Ok(());
        }
        let layout = self.layout.select_dims(&keep)?;
        self.backend
            .squeeze(&self.context, &self.layout, &layout, &keep)?;
        log::debug!(
            "squeezed the array shape {} to {}",
            self.layout.shape(),
            layout.shape()
        );
        self.layout = layout;
        if self.filled {
            self.backend.finalize(&self.layout)?;
        }
        Ok(())
    }

    /// Copy the contents of `src` to `dest`.
    ///
    /// `dest` keeps its storage.
    /// If both arrays are chunked with the same chunk shape and codec, encoded chunks are shared rather than re-encoded.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - the shape or item size of `dest` does not match `src`,
    ///  - `dest` already holds data,
    ///  - a chunk of `src` has not been written, or
    ///  - a chunk cannot be decoded or encoded.
    pub fn copy(dest: &mut Self, src: &Self) -> Result<(), ArrayError> {
        if dest.shape() != src.shape() {
            return Err(ArrayError::IncompatibleShape {
                got: *dest.shape(),
                expected: *src.shape(),
            });
        }
        if dest.itemsize() != src.itemsize() {
            return Err(ArrayError::IncompatibleElementType(
                dest.itemsize(),
                src.itemsize(),
            ));
        }
        dest.ensure_empty()?;

        let layout = dest.layout.clone();
        let same_encoding = src.backend.kind() == BackendKind::Chunked
            && dest.backend.kind() == BackendKind::Chunked
            && src.chunkshape() == dest.chunkshape()
            && src.backend.codec_configuration() == dest.backend.codec_configuration();
        if same_encoding {
            let chunks = (0..src.nchunks())
                .map(|index| src.backend.encoded_chunk(index))
                .collect::<Result<Vec<_>, _>>()?;
            log::debug!("copying {} encoded chunks", chunks.len());
            let mut backend = dest.backend.reshape(&dest.context, &layout)?;
            backend.fill_encoded(&layout, chunks)?;
            dest.replace_backend(layout, backend)
        } else if src.backend.kind() == BackendKind::PlainBuffer
            && dest.backend.kind() == BackendKind::PlainBuffer
        {
            let whole = ArraySubset::new_with_shape(src.shape().to_vec());
            let bytes = src.backend.contiguous_bytes(&src.layout, &whole)?;
            let mut backend = dest.backend.reshape(&dest.context, &layout)?;
            backend.write_region(&layout, &whole, bytes)?;
            dest.replace_backend(layout, backend)
        } else {
            dest.fill_with(layout, &src.region_reader())
        }
    }

    /// Copy the contents of `src` to this array.
    ///
    /// # Errors
    /// See [`Array::copy`].
    pub fn copy_from(&mut self, src: &Self) -> Result<(), ArrayError> {
        Self::copy(self, src)
    }

    /// Return the context of the array.
    #[must_use]
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Return the kind of backend of the array.
    #[must_use]
    pub fn backend(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Return the configuration of the codec encoding the chunks, or [`None`] for a plain buffer array.
    #[must_use]
    pub fn codec_configuration(&self) -> Option<CodecConfiguration> {
        self.backend.codec_configuration()
    }

    /// Return the size of an element in bytes.
    #[must_use]
    pub fn itemsize(&self) -> usize {
        self.layout.itemsize()
    }

    /// Return the rank of the array.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.layout.ndim()
    }

    /// Return the shape of the array.
    #[must_use]
    pub fn shape(&self) -> &Dims {
        self.layout.shape()
    }

    /// Return the shape of a chunk.
    #[must_use]
    pub fn chunkshape(&self) -> &Dims {
        self.layout.chunkshape()
    }

    /// Return the shape of a block.
    #[must_use]
    pub fn blockshape(&self) -> &Dims {
        self.layout.blockshape()
    }

    /// Return the extended shape: the shape rounded up to a multiple of the chunk shape.
    #[must_use]
    pub fn extshape(&self) -> &Dims {
        self.layout.extshape()
    }

    /// Return the number of elements of the array.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.layout.size()
    }

    /// Return the number of elements of a chunk.
    #[must_use]
    pub fn chunksize(&self) -> u64 {
        self.layout.chunksize()
    }

    /// Return the number of elements of the extended shape.
    #[must_use]
    pub fn extendedsize(&self) -> u64 {
        self.layout.extendedsize()
    }

    /// Return the number of chunks of the array.
    #[must_use]
    pub fn nchunks(&self) -> u64 {
        self.layout.nchunks()
    }

    /// Return the number of chunks written to the array.
    #[must_use]
    pub fn nparts(&self) -> u64 {
        self.nparts
    }

    /// Returns true if every chunk of the array has been written.
    #[must_use]
    pub fn filled(&self) -> bool {
        self.filled
    }

    /// Return an error if the array holds data.
    fn ensure_empty(&self) -> Result<(), ArrayError> {
        if self.nparts == 0 && !self.filled {
            Ok(())
        } else {
            Err(ArrayError::NotEmpty {
                nparts: self.nparts,
            })
        }
    }

    /// Return a reader of regions of this array.
    fn region_reader(
        &self,
    ) -> impl Fn(&ArraySubset, &mut [u8], &[u64]) -> Result<(), ArrayError> + Sync + '_ {
        |region: &ArraySubset, dest: &mut [u8], dest_shape: &[u64]| {
            self.backend
                .read_region(&self.context, &self.layout, region, dest, dest_shape)
        }
    }

    /// Fill the array with `layout` from `reader`.
    ///
    /// The array is unchanged if an error occurs.
    fn fill_with(
        &mut self,
        layout: ArrayLayout,
        reader: &RegionReader<'_>,
    ) -> Result<(), ArrayError> {
        let mut backend = self.backend.reshape(&self.context, &layout)?;
        backend.fill(&self.context, &layout, reader)?;
        self.replace_backend(layout, backend)
    }

    /// Replace the backend and layout of the array with a filled backend.
    fn replace_backend(
        &mut self,
        layout: ArrayLayout,
        mut backend: Box<dyn ArrayBackend>,
    ) -> Result<(), ArrayError> {
        backend.finalize(&layout)?;
        log::debug!(
            "filled the {} array with {} chunks",
            backend.kind(),
            layout.nchunks()
        );
        self.nparts = layout.nchunks();
        self.filled = true;
        self.layout = layout;
        self.backend = backend;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextConfig;

    fn context() -> Arc<Context> {
        Context::new(ContextConfig::default().with_codec(CodecConfiguration::Bytes)).unwrap()
    }

    #[test]
    fn array_empty() {
        let context = context();
        let array = Array::empty(
            &context,
            &ArrayParams::new(8, [5, 6, 3]),
            &ChunkedStorage::new([4, 3, 3], [3, 3, 2]).into(),
        )
        .unwrap();
        assert_eq!(array.backend(), BackendKind::Chunked);
        assert_eq!(array.ndim(), 3);
        assert_eq!(array.extshape().as_slice(), &[8, 6, 3]);
        assert_eq!(array.size(), 90);
        assert_eq!(array.chunksize(), 36);
        assert_eq!(array.extendedsize(), 144);
        assert_eq!(array.nchunks(), 4);
        assert_eq!(array.nparts(), 0);
        assert!(!array.filled());
        assert_eq!(array.codec_configuration(), Some(CodecConfiguration::Bytes));

        let array =
            Array::empty(&context, &ArrayParams::new(2, [3, 4]), &Storage::PlainBuffer).unwrap();
        assert_eq!(array.backend(), BackendKind::PlainBuffer);
        assert_eq!(array.chunkshape().as_slice(), &[3, 4]);
        assert_eq!(array.nchunks(), 1);
        assert!(array.codec_configuration().is_none());
        assert_eq!(array.to_vec().unwrap(), vec![0; 24]);
    }

    #[test]
    fn array_append() {
        let context = context();
        let mut array = Array::empty(
            &context,
            &ArrayParams::new(1, [3, 3]),
            &ChunkedStorage::new([2, 2], [2, 2]).into(),
        )
        .unwrap();
        // Chunk size is checked before the filled state
        assert_eq!(
            array.append(&[0; 3]).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert!(matches!(
            array.to_vec(),
            Err(ArrayError::ChunkNotWritten(0))
        ));
        for i in 0..4u8 {
            array.append(&[i; 4]).unwrap();
            assert_eq!(array.nparts(), u64::from(i) + 1);
        }
        assert!(array.filled());
        assert_eq!(
            array.to_vec().unwrap(),
            vec![0, 0, 1, 0, 0, 1, 2, 2, 3]
        );
        assert_eq!(
            array.append(&[0; 4]).unwrap_err().kind(),
            ErrorKind::ContainerFilled
        );
        assert_eq!(
            array.append(&[0; 3]).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(array.nparts(), 4);
    }

    #[test]
    fn array_append_plain_buffer() {
        let context = context();
        let mut array =
            Array::empty(&context, &ArrayParams::new(1, [2, 3]), &Storage::PlainBuffer).unwrap();
        array.append(&[1, 2, 3, 4, 5, 6]).unwrap();
        assert!(array.filled());
        assert_eq!(array.to_vec().unwrap(), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(
            array.append(&[0; 6]).unwrap_err().kind(),
            ErrorKind::ContainerFilled
        );

        // A zero-volume array has no chunks to append
        let mut array =
            Array::empty(&context, &ArrayParams::new(1, [2, 0]), &Storage::PlainBuffer).unwrap();
        assert_eq!(array.nchunks(), 0);
        assert_eq!(
            array.append(&[0; 2]).unwrap_err().kind(),
            ErrorKind::ContainerFilled
        );
    }

    #[test]
    fn array_from_buffer_invalid_size() {
        let context = context();
        let result = Array::from_buffer(
            &context,
            &ArrayParams::new(2, [3, 3]),
            &Storage::PlainBuffer,
            &[0; 17],
        );
        assert!(matches!(
            result,
            Err(ArrayError::InvalidBytesInputSize(17, 18))
        ));
    }

    #[test]
    fn array_squeeze() {
        let context = context();
        let data: Vec<u8> = (0..12).collect();
        let mut array = Array::from_buffer(
            &context,
            &ArrayParams::new(1, [1, 4, 1, 3]),
            &ChunkedStorage::new([1, 2, 1, 2], [1, 2, 1, 2]).into(),
            &data,
        )
        .unwrap();
        array.squeeze().unwrap();
        assert_eq!(array.shape().as_slice(), &[4, 3]);
        assert_eq!(array.chunkshape().as_slice(), &[2, 2]);
        assert_eq!(array.to_vec().unwrap(), data);
        array.squeeze().unwrap();
        assert_eq!(array.shape().as_slice(), &[4, 3]);

        let mut array = Array::from_buffer(
            &context,
            &ArrayParams::new(1, [1, 1]),
            &ChunkedStorage::new([2, 3], [1, 1]).into(),
            &[7],
        )
        .unwrap();
        array.squeeze().unwrap();
        assert_eq!(array.shape().as_slice(), &[1]);
        assert_eq!(array.chunkshape().as_slice(), &[3]);
        assert_eq!(array.to_vec().unwrap(), vec![7]);
    }

    #[test]
    fn array_copy_incompatible() {
        let context = context();
        let src = Array::from_buffer(
            &context,
            &ArrayParams::new(1, [2, 2]),
            &Storage::PlainBuffer,
            &[1, 2, 3, 4],
        )
        .unwrap();
        let mut dest =
            Array::empty(&context, &ArrayParams::new(1, [2, 3]), &Storage::PlainBuffer).unwrap();
        assert_eq!(
            dest.copy_from(&src).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        let mut dest =
            Array::empty(&context, &ArrayParams::new(2, [2, 2]), &Storage::PlainBuffer).unwrap();
        assert!(matches!(
            dest.copy_from(&src),
            Err(ArrayError::IncompatibleElementType(2, 1))
        ));
        let mut dest = Array::from_buffer(
            &context,
            &ArrayParams::new(1, [2, 2]),
            &Storage::PlainBuffer,
            &[0; 4],
        )
        .unwrap();
        assert_eq!(
            dest.copy_from(&src).unwrap_err().kind(),
            ErrorKind::ContainerFilled
        );
    }
}
