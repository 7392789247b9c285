//! Bounded-rank dimension vectors.
//!
//! A [`Dims`] holds up to [`MAX_DIM`] extents or coordinates, and is used for array shapes, chunk shapes, block shapes, and slice bounds.
//!
//! Address arithmetic works on dimensions [normalised](normalize) to the full [`MAX_DIM`] width.
//! Normalisation is right-aligned: the last dimension of a [`Dims`] is the innermost (fastest varying) normalised dimension, and leading dimensions are padded.
//! This lets a single row-major linearisation formula apply regardless of rank.

use derive_more::Display;
use thiserror::Error;

/// The maximum rank of an array.
pub const MAX_DIM: usize = 8;

/// A dimension vector with a rank of at most [`MAX_DIM`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("{:?}", self.as_slice())]
pub struct Dims {
    dims: [u64; MAX_DIM],
    ndim: usize,
}

/// The rank of a dimension vector exceeds [`MAX_DIM`].
#[derive(Clone, Debug, Error)]
#[error("rank {_0} exceeds the maximum rank of {MAX_DIM}")]
pub struct DimsError(usize);

impl DimsError {
    /// The rank that was requested.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.0
    }
}

impl Dims {
    /// Create a new dimension vector.
    ///
    /// # Errors
    /// Returns [`DimsError`] if `dims` has more than [`MAX_DIM`] elements.
    pub fn new(dims: &[u64]) -> Result<Self, DimsError> {
        if dims.len() > MAX_DIM {
            return Err(DimsError(dims.len()));
        }
        let mut out = [0; MAX_DIM];
        out[..dims.len()].copy_from_slice(dims);
        Ok(Self {
            dims: out,
            ndim: dims.len(),
        })
    }

    /// Return the rank.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.ndim
    }

    /// Return the dimensions as a slice of length [`ndim`](Dims::ndim).
    #[must_use]
    pub fn as_slice(&self) -> &[u64] {
        &self.dims[..self.ndim]
    }

    /// Return the product of the dimensions.
    ///
    /// This is `1` for a rank 0 dimension vector.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.as_slice().iter().product()
    }

    /// Return the product of the dimensions, or [`None`] if it overflows a [`u64`].
    #[must_use]
    pub fn checked_num_elements(&self) -> Option<u64> {
        self.as_slice()
            .iter()
            .try_fold(1u64, |acc, &dim| acc.checked_mul(dim))
    }

    /// Return the dimensions normalised to [`MAX_DIM`] with leading dimensions set to `pad`.
    ///
    /// See [`normalize`].
    #[must_use]
    pub fn normalize(&self, pad: u64) -> [u64; MAX_DIM] {
        normalize(self.as_slice(), pad)
    }
}

impl core::fmt::Debug for Dims {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl AsRef<[u64]> for Dims {
    fn as_ref(&self) -> &[u64] {
        self.as_slice()
    }
}

impl core::ops::Deref for Dims {
    type Target = [u64];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl TryFrom<&[u64]> for Dims {
    type Error = DimsError;

    fn try_from(dims: &[u64]) -> Result<Self, Self::Error> {
        Self::new(dims)
    }
}

impl TryFrom<Vec<u64>> for Dims {
    type Error = DimsError;

    fn try_from(dims: Vec<u64>) -> Result<Self, Self::Error> {
        Self::new(&dims)
    }
}

impl<const N: usize> From<[u64; N]> for Dims {
    fn from(dims: [u64; N]) -> Self {
        const { assert!(N <= MAX_DIM, "the rank must not exceed MAX_DIM") };
        let mut out = [0; MAX_DIM];
        out[..N].copy_from_slice(&dims);
        Self { dims: out, ndim: N }
    }
}

/// Normalise `dims` to [`MAX_DIM`] dimensions.
///
/// Normalisation is right-aligned: `dims[dims.len() - 1]` maps to index `MAX_DIM - 1`.
/// The leading `MAX_DIM - dims.len()` entries are set to `pad`, which should be `1` for shapes and `0` for coordinates.
///
/// # Panics
/// Panics if `dims` has more than [`MAX_DIM`] elements.
#[must_use]
pub fn normalize(dims: &[u64], pad: u64) -> [u64; MAX_DIM] {
    let mut out = [pad; MAX_DIM];
    out[MAX_DIM - dims.len()..].copy_from_slice(dims);
    out
}

/// Return the row-major element strides of a normalised shape.
#[must_use]
pub fn strides(shape: &[u64; MAX_DIM]) -> [u64; MAX_DIM] {
    let mut strides = [1; MAX_DIM];
    for i in (0..MAX_DIM - 1).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

/// Return the linear element offset of the normalised coordinate `start` in an array with the normalised `shape`.
///
/// The offset is accumulated from the innermost dimension outward.
#[must_use]
pub fn linear_offset(start: &[u64; MAX_DIM], shape: &[u64; MAX_DIM]) -> u64 {
    let mut offset = 0;
    let mut stride = 1;
    for i in (0..MAX_DIM).rev() {
        offset += start[i] * stride;
        stride *= shape[i];
    }
    offset
}
