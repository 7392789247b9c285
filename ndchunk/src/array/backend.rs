//! Array backends.
//!
//! An [`Array`](super::Array) delegates storage of its contents to a backend selected by its [`Storage`].
//! The array maintains the number of written chunks and whether it is filled, and a backend only stores and retrieves bytes.

mod chunked;
mod plain_buffer;

use bytes::Bytes;
use derive_more::Display;
use ndchunk_codec::CodecConfiguration;

pub(crate) use chunked::ChunkedBackend;
pub(crate) use plain_buffer::PlainBufferBackend;

use super::{ArrayError, ArrayLayout, Storage};
use crate::array_subset::ArraySubset;
use crate::context::Context;

/// The kind of backend of an array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum BackendKind {
    /// Independently encoded chunks.
    #[display("chunked")]
    Chunked,
    /// One flat, unencoded buffer.
    #[display("plain buffer")]
    PlainBuffer,
}

/// Reads a region of an array into a buffer with the given shape.
///
/// The region is written at the origin of the buffer.
pub(crate) type RegionReader<'a> =
    dyn Fn(&ArraySubset, &mut [u8], &[u64]) -> Result<(), ArrayError> + Sync + 'a;

/// Traits for an array backend.
///
/// Operations that a backend cannot perform return [`ArrayError::UnsupportedOperation`].
pub(crate) trait ArrayBackend: core::fmt::Debug + Send + Sync {
    /// Return the kind of the backend.
    fn kind(&self) -> BackendKind;

    /// Store the chunk at `index` from its decoded bytes.
    ///
    /// The size of `chunk` has been validated by the caller.
    fn append(
        &mut self,
        context: &Context,
        layout: &ArrayLayout,
        index: u64,
        chunk: &[u8],
    ) -> Result<(), ArrayError>;

    /// Store every chunk of the array with the contents returned by `reader`.
    fn fill(
        &mut self,
        context: &Context,
        layout: &ArrayLayout,
        reader: &RegionReader<'_>,
    ) -> Result<(), ArrayError>;

    /// Store every chunk of the array from already encoded chunks.
    fn fill_encoded(
        &mut self,
        _layout: &ArrayLayout,
        _chunks: Vec<Bytes>,
    ) -> Result<(), ArrayError> {
        Err(self.unsupported("fill_encoded"))
    }

    /// Read `region` of the array into `dest`, a buffer with `dest_shape`, at its origin.
    fn read_region(
        &self,
        context: &Context,
        layout: &ArrayLayout,
        region: &ArraySubset,
        dest: &mut [u8],
        dest_shape: &[u64],
    ) -> Result<(), ArrayError>;

    /// Write `src`, a buffer with the shape of `region`, to `region` of the array.
    fn write_region(
        &mut self,
        _layout: &ArrayLayout,
        _region: &ArraySubset,
        _src: &[u8],
    ) -> Result<(), ArrayError> {
        Err(self.unsupported("set_slice_buffer"))
    }

    /// Return the bytes of `region` of the array without copying.
    fn contiguous_bytes(
        &self,
        _layout: &ArrayLayout,
        _region: &ArraySubset,
    ) -> Result<&[u8], ArrayError> {
        Err(self.unsupported("get_slice_buffer_no_copy"))
    }

    /// Create an empty backend of the same kind and options for `layout`.
    fn reshape(
        &self,
        context: &Context,
        layout: &ArrayLayout,
    ) -> Result<Box<dyn ArrayBackend>, ArrayError>;

    /// Remove dimensions from the stored chunks.
    ///
    /// `layout` retains the dimensions of `old_layout` at `keep`.
    fn squeeze(
        &mut self,
        context: &Context,
        old_layout: &ArrayLayout,
        layout: &ArrayLayout,
        keep: &[usize],
    ) -> Result<(), ArrayError>;

    /// Return the encoded chunk at `index`.
    fn encoded_chunk(&self, _index: u64) -> Result<Bytes, ArrayError> {
        Err(self.unsupported("encoded_chunk"))
    }

    /// Return the configuration of the codec encoding the chunks, if the chunks are encoded.
    fn codec_configuration(&self) -> Option<CodecConfiguration> {
        None
    }

    /// Called when the array becomes filled.
    fn finalize(&mut self, _layout: &ArrayLayout) -> Result<(), ArrayError> {
        Ok(())
    }

    /// Drop the chunk at `index`, the last one appended.
    fn discard_chunk(&mut self, _index: u64) {}

    /// Return an [`ArrayError::UnsupportedOperation`] error for `operation`.
    fn unsupported(&self, operation: &'static str) -> ArrayError {
        ArrayError::UnsupportedOperation {
            operation,
            backend: self.kind(),
        }
    }
}

/// Create an empty backend for `storage`.
pub(crate) fn new_backend(
    context: &Context,
    layout: &ArrayLayout,
    storage: &Storage,
) -> Result<Box<dyn ArrayBackend>, ArrayError> {
    match storage {
        Storage::Chunked(storage) => Ok(Box::new(ChunkedBackend::new(
            context.codec().clone(),
            storage.filename.clone(),
            storage.enforce_frame,
        ))),
        Storage::PlainBuffer => Ok(Box::new(PlainBufferBackend::new(context, layout)?)),
    }
}
