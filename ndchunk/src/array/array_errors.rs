use std::sync::Arc;

use derive_more::Display;
use ndchunk_codec::CodecError;
use ndchunk_codec::frame::FrameError;
use thiserror::Error;

use super::BackendKind;
use crate::array_subset::{ArraySubset, ArraySubsetError};
use crate::dims::{Dims, DimsError, MAX_DIM};

/// The kind of an [`ArrayError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An allocation failed.
    NullPointer,
    /// A size, shape, rank, or bounds mismatch against the contract of an operation.
    InvalidArgument,
    /// The operation is not supported by the backend of the array.
    InvalidStorage,
    /// A chunk was appended to a filled array, or data was written to an array that already holds data.
    ContainerFilled,
    /// A codec failed.
    Codec,
    /// Reading or writing a frame failed.
    Frame,
}

/// Array errors.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum ArrayError {
    /// The allocator failed to allocate a buffer.
    #[error("failed to allocate a buffer of {_0} bytes")]
    AllocationFailed(usize),
    /// A dimension vector exceeds the maximum rank.
    #[error(transparent)]
    DimsError(#[from] DimsError),
    /// The item size is zero.
    #[error("the item size must be positive")]
    InvalidItemSize,
    /// The rank of the array is zero or exceeds [`MAX_DIM`].
    #[error("the array rank {_0} must be between 1 and {MAX_DIM}")]
    InvalidRank(usize),
    /// Incompatible dimensionality.
    #[error("{what} has dimensionality {got}, expected {expected}")]
    IncompatibleDimensionality {
        /// What has the incompatible dimensionality.
        what: &'static str,
        /// The dimensionality.
        got: usize,
        /// The expected dimensionality.
        expected: usize,
    },
    /// Invalid chunk shape (contains zero).
    #[error("invalid chunk shape {_0}: all elements must be non-zero")]
    InvalidChunkShape(Dims),
    /// Invalid block shape (contains zero or exceeds the chunk shape).
    #[error("invalid block shape {blockshape}: all elements must be non-zero and at most the chunk shape {chunkshape}")]
    InvalidBlockShape {
        /// The block shape.
        blockshape: Dims,
        /// The chunk shape.
        chunkshape: Dims,
    },
    /// The size in bytes of the array or of its chunks is not addressable.
    #[error("an array with shape {shape}, chunk shape {chunkshape} and item size {itemsize} exceeds the addressable size")]
    SizeOverflow {
        /// The shape.
        shape: Dims,
        /// The chunk shape.
        chunkshape: Dims,
        /// The item size.
        itemsize: usize,
    },
    /// An unexpected bytes input size.
    #[error("got bytes with size {_0:?}, expected {_1:?}")]
    InvalidBytesInputSize(usize, u64),
    /// Incompatible element size.
    #[error("the element size {_0} does not match the item size {_1}")]
    IncompatibleElementType(usize, usize),
    /// Incompatible array subset.
    #[error("array subset {_0} is not compatible with array shape {_1:?}")]
    InvalidArraySubset(ArraySubset, Vec<u64>),
    /// An [`ArraySubsetError`].
    #[error(transparent)]
    ArraySubsetError(#[from] ArraySubsetError),
    /// The shape of a destination buffer cannot hold a region.
    #[error("destination shape {dest_shape:?} cannot hold a region with shape {region_shape:?}")]
    InvalidDestinationShape {
        /// The destination shape.
        dest_shape: Vec<u64>,
        /// The region shape.
        region_shape: Vec<u64>,
    },
    /// The array subset is not one contiguous run of elements.
    #[error("array subset {_0} is not contiguous in the array")]
    NonContiguousSlice(ArraySubset),
    /// The shapes of two arrays do not match.
    #[error("array shape {got} does not match {expected}")]
    IncompatibleShape {
        /// The shape.
        got: Dims,
        /// The expected shape.
        expected: Dims,
    },
    /// A chunk that has not been written was read.
    #[error("chunk {_0} has not been written")]
    ChunkNotWritten(u64),
    /// A frame is not compatible with the array it describes.
    #[error("invalid frame: {_0}")]
    InvalidFrame(String),
    /// The operation is not supported by the backend of the array.
    #[error("`{operation}` is not supported by the {backend} backend")]
    UnsupportedOperation {
        /// The operation.
        operation: &'static str,
        /// The backend of the array.
        backend: BackendKind,
    },
    /// The array is filled.
    #[error("the array is filled, all {nchunks} chunks have been written")]
    ContainerFilled {
        /// The number of chunks of the array.
        nchunks: u64,
    },
    /// The array already holds data.
    #[error("the array already holds data, {nparts} chunks have been written")]
    NotEmpty {
        /// The number of chunks written to the array.
        nparts: u64,
    },
    /// A codec error.
    #[error(transparent)]
    CodecError(#[from] CodecError),
    /// A frame error.
    #[error(transparent)]
    FrameError(#[from] Arc<FrameError>),
}

impl From<FrameError> for ArrayError {
    fn from(err: FrameError) -> Self {
        Self::FrameError(Arc::new(err))
    }
}

impl ArrayError {
    /// Return the kind of the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AllocationFailed(_) => ErrorKind::NullPointer,
            Self::DimsError(_)
            | Self::InvalidItemSize
            | Self::InvalidRank(_)
            | Self::IncompatibleDimensionality { .. }
            | Self::InvalidChunkShape(_)
            | Self::InvalidBlockShape { .. }
            | Self::SizeOverflow { .. }
            | Self::InvalidBytesInputSize(..)
            | Self::IncompatibleElementType(..)
            | Self::InvalidArraySubset(..)
            | Self::ArraySubsetError(_)
            | Self::InvalidDestinationShape { .. }
            | Self::NonContiguousSlice(_)
            | Self::IncompatibleShape { .. }
            | Self::ChunkNotWritten(_)
            | Self::InvalidFrame(_) => ErrorKind::InvalidArgument,
            Self::UnsupportedOperation { .. } => ErrorKind::InvalidStorage,
            Self::ContainerFilled { .. } | Self::NotEmpty { .. } => ErrorKind::ContainerFilled,
            Self::CodecError(_) => ErrorKind::Codec,
            Self::FrameError(_) => ErrorKind::Frame,
        }
    }
}
