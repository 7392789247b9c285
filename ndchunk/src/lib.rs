//! `ndchunk` is a Rust library for N-dimensional chunked arrays held in memory or persisted as frames.
//!
//! An [`Array`] has a fixed element size in bytes (`itemsize`) and a shape of up to [`MAX_DIM`] dimensions.
//! Its contents are stored by one of two backends selected at creation with [`Storage`]:
//!  - [`Storage::Chunked`]: the array is tiled by a regular grid of chunks with a fixed `chunkshape`.
//!    The grid covers the array shape rounded up to a multiple of the chunk shape, so edge chunks carry padding.
//!    Each chunk is encoded independently by the [codec](ndchunk_codec::Codec) of the [`Context`] the array was created with.
//!  - [`Storage::PlainBuffer`]: the array is one flat, unencoded row-major buffer.
//!
//! An array is created empty and is filled by appending chunks in row-major chunk-grid order ([`Array::append`]), or in one step from a buffer ([`Array::from_buffer`]).
//! Regions can be extracted into buffers ([`Array::get_slice_buffer`]) or new arrays ([`Array::get_slice`]), and chunked arrays can be persisted as frames ([`Array::to_sframe`], [`Array::save`], [`Array::from_file`]).
//!
//! ## Example
//! ```rust
//! use ndchunk::{Array, ArrayParams, ChunkedStorage, Context, ContextConfig};
//!
//! let context = Context::new(ContextConfig::default())?;
//! let params = ArrayParams::new(8, [5, 6, 3]);
//! let storage = ChunkedStorage::new([4, 3, 3], [3, 3, 2]).into();
//!
//! let elements: Vec<f64> = (0..90).map(f64::from).collect();
//! let array = Array::from_elements(&context, &params, &storage, &elements)?;
//! assert!(array.filled());
//! assert_eq!(array.nchunks(), 4);
//! assert_eq!(array.to_elements::<f64>()?, elements);
//!
//! // Extract a region
//! let slice = array.slice(&[1, 2, 0], &[3, 4, 3], &storage)?;
//! assert_eq!(slice.shape().as_slice(), &[2, 2, 3]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Crate Features
//! #### Default
//!  - `blosc`: enable the `blosc` codec.
//!  - `gzip`: enable the `gzip` codec.
//!  - `zstd`: enable the `zstd` codec.
//!
//! ## Licence
//! `ndchunk` is licensed under either of
//!  - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license <http://opensource.org/licenses/MIT>, at your option.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(clippy::wildcard_enum_match_arm)]

pub mod array;
pub mod array_subset;
pub mod config;
pub mod context;
pub mod dims;

pub use ndchunk_codec as codec;

pub use array::{
    Array, ArrayError, ArrayParams, BackendKind, ChunkedStorage, ErrorKind, Storage,
};
pub use context::{BufferAllocator, Context, ContextConfig, ContextError, DefaultAllocator};
pub use dims::{Dims, DimsError, MAX_DIM};

/// Convert a `u64` to a `usize`.
///
/// # Panics
/// Panics if `value` exceeds [`usize::MAX`].
pub(crate) fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap()
}
