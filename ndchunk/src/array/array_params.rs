use std::path::{Path, PathBuf};

use crate::dims::Dims;

/// Array creation parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrayParams {
    /// The size of an element in bytes.
    pub itemsize: usize,
    /// The shape of the array.
    pub shape: Dims,
}

impl ArrayParams {
    /// Create new array parameters.
    #[must_use]
    pub fn new(itemsize: usize, shape: impl Into<Dims>) -> Self {
        Self {
            itemsize,
            shape: shape.into(),
        }
    }
}

/// The storage of an array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Storage {
    /// A grid of independently encoded chunks.
    Chunked(ChunkedStorage),
    /// One flat, unencoded buffer.
    PlainBuffer,
}

impl From<ChunkedStorage> for Storage {
    fn from(storage: ChunkedStorage) -> Self {
        Self::Chunked(storage)
    }
}

/// The storage parameters of a chunked array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkedStorage {
    /// The shape of a chunk.
    pub chunkshape: Dims,
    /// The shape of a block, the unit of encoding within a chunk.
    pub blockshape: Dims,
    /// If set, the array is persisted as a frame at this path once filled.
    pub filename: Option<PathBuf>,
    /// If true, the chunks of the array are consolidated into one contiguous frame once filled.
    pub enforce_frame: bool,
}

impl ChunkedStorage {
    /// Create new chunked storage parameters.
    #[must_use]
    pub fn new(chunkshape: impl Into<Dims>, blockshape: impl Into<Dims>) -> Self {
        Self {
            chunkshape: chunkshape.into(),
            blockshape: blockshape.into(),
            filename: None,
            enforce_frame: false,
        }
    }

    /// Persist the array as a frame at `filename` once filled.
    #[must_use]
    pub fn with_filename(mut self, filename: impl AsRef<Path>) -> Self {
        self.filename = Some(filename.as_ref().to_path_buf());
        self
    }

    /// Consolidate the chunks of the array into one contiguous frame once filled.
    #[must_use]
    pub fn with_enforce_frame(mut self, enforce_frame: bool) -> Self {
        self.enforce_frame = enforce_frame;
        self
    }
}
