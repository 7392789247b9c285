//! Array subsets.
//!
//! An [`ArraySubset`] represents a rectangular region of an array or chunk.
//!
//! This module also provides [`copy_region`], which copies a region between two row-major buffers with a fixed element size.

use std::fmt::Display;
use std::ops::Range;

use thiserror::Error;

use crate::dims::{MAX_DIM, normalize, strides};
use crate::to_usize;

/// An array subset error.
#[derive(Clone, Debug, Error)]
#[allow(missing_docs)]
pub enum ArraySubsetError {
    /// Incompatible dimensionality.
    #[error("incompatible dimensionality {got}, expected {expected}")]
    IncompatibleDimensionality { got: usize, expected: usize },
    /// Incompatible start and shape.
    #[error("incompatible start {start:?} with shape {shape:?}")]
    IncompatibleStartShape { start: Vec<u64>, shape: Vec<u64> },
    /// Incompatible start and end indices.
    #[error("incompatible start {start:?} with end {end:?}")]
    IncompatibleStartEnd { start: Vec<u64>, end: Vec<u64> },
    /// Incompatible offset.
    #[error("incompatible offset {offset:?} for region with start {start:?}")]
    IncompatibleOffset { start: Vec<u64>, offset: Vec<u64> },
}

/// An array subset.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct ArraySubset {
    start: Vec<u64>,
    shape: Vec<u64>,
}

impl Display for ArraySubset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.to_ranges(), f)
    }
}

impl ArraySubset {
    /// Create a new array subset with `shape` starting at the origin.
    #[must_use]
    pub fn new_with_shape(shape: Vec<u64>) -> Self {
        Self {
            start: vec![0; shape.len()],
            shape,
        }
    }

    /// Create a new array subset.
    ///
    /// # Errors
    /// Returns [`ArraySubsetError`] if the length of `start` and `shape` do not match.
    pub fn new_with_start_shape(
        start: Vec<u64>,
        shape: Vec<u64>,
    ) -> Result<Self, ArraySubsetError> {
        if start.len() == shape.len() {
            Ok(Self { start, shape })
        } else {
            Err(ArraySubsetError::IncompatibleStartShape { start, shape })
        }
    }

    /// Create a new array subset from a start and end (exclusive).
    ///
    /// # Errors
    /// Returns [`ArraySubsetError`] if `start` and `end` are incompatible, such as if any element of `end` is less than `start` or they differ in length.
    pub fn new_with_start_end_exc(start: Vec<u64>, end: Vec<u64>) -> Result<Self, ArraySubsetError> {
        if start.len() != end.len() || std::iter::zip(&start, &end).any(|(start, end)| end < start)
        {
            Err(ArraySubsetError::IncompatibleStartEnd { start, end })
        } else {
            let shape = std::iter::zip(&start, end)
                .map(|(&start, end)| end - start)
                .collect();
            Ok(Self { start, shape })
        }
    }

    /// Return the start of the array subset.
    #[must_use]
    pub fn start(&self) -> &[u64] {
        &self.start
    }

    /// Return the shape of the array subset.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Return the dimensionality of the array subset.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.start.len()
    }

    /// Return the end (exclusive) of the array subset.
    #[must_use]
    pub fn end_exc(&self) -> Vec<u64> {
        std::iter::zip(&self.start, &self.shape)
            .map(|(start, size)| start + size)
            .collect()
    }

    /// Return the array subset as a vec of ranges.
    #[must_use]
    pub fn to_ranges(&self) -> Vec<Range<u64>> {
        std::iter::zip(&self.start, &self.shape)
            .map(|(&start, &size)| start..start + size)
            .collect()
    }

    /// Return the number of elements of the array subset.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }

    /// Returns true if the array subset contains no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shape.contains(&0)
    }

    /// Returns true if the array subset is within the bounds of an array with `array_shape`.
    #[must_use]
    pub fn inbounds_shape(&self, array_shape: &[u64]) -> bool {
        self.dimensionality() == array_shape.len()
            && itertools::izip!(&self.start, &self.shape, array_shape)
                .all(|(start, size, array_size)| start + size <= *array_size)
    }

    /// Return the overlapping subset between this array subset and `subset_other`.
    ///
    /// # Errors
    /// Returns [`ArraySubsetError`] if the dimensionality of `subset_other` does not match the dimensionality of this array subset.
    pub fn overlap(&self, subset_other: &Self) -> Result<Self, ArraySubsetError> {
        if subset_other.dimensionality() != self.dimensionality() {
            return Err(ArraySubsetError::IncompatibleDimensionality {
                got: subset_other.dimensionality(),
                expected: self.dimensionality(),
            });
        }
        let (start, shape) = itertools::izip!(
            &self.start,
            &self.shape,
            &subset_other.start,
            &subset_other.shape
        )
        .map(|(&start, &size, &other_start, &other_size)| {
            let overlap_start = start.max(other_start);
            let overlap_end = (start + size).min(other_start + other_size);
            (overlap_start, overlap_end.saturating_sub(overlap_start))
        })
        .unzip();
        Ok(Self { start, shape })
    }

    /// Return the subset relative to `start`.
    ///
    /// Creates an array subset starting at [`ArraySubset::start()`] - `start`.
    ///
    /// # Errors
    /// Returns [`ArraySubsetError`] if the length of `start` does not match the dimensionality of this array subset, or `start` exceeds the start of this array subset.
    pub fn relative_to(&self, start: &[u64]) -> Result<Self, ArraySubsetError> {
        if start.len() != self.dimensionality()
            || std::iter::zip(&self.start, start).any(|(a, b)| b > a)
        {
            return Err(ArraySubsetError::IncompatibleOffset {
                start: self.start.clone(),
                offset: start.to_vec(),
            });
        }
        Ok(Self {
            start: std::iter::zip(&self.start, start)
                .map(|(a, b)| a - b)
                .collect(),
            shape: self.shape.clone(),
        })
    }

    /// Returns true if the elements of the array subset are one contiguous run in a row-major array with `array_shape`.
    ///
    /// An empty array subset is contiguous.
    /// The array subset is assumed to be within the bounds of the array.
    ///
    /// # Panics
    /// Panics if the dimensionality exceeds [`MAX_DIM`].
    #[must_use]
    pub fn is_contiguous_in(&self, array_shape: &[u64]) -> bool {
        if self.is_empty() {
            return true;
        }
        let region = normalize(&self.shape, 1);
        let array = normalize(array_shape, 1);
        let mut inner = MAX_DIM - 1;
        while inner > 0 && region[inner] == array[inner] {
            inner -= 1;
        }
        region[..inner].iter().all(|&size| size == 1)
    }
}

/// Copy a region between two row-major buffers with elements of `itemsize` bytes.
///
/// The region `src_subset` of `src` (an array with `src_shape`) is copied to `dst` (an array with `dst_shape`) starting at `dst_start`.
/// Trailing dimensions spanned entirely by the region in both arrays are merged into a single contiguous copy.
///
/// # Panics
/// Panics if
///  - the dimensionality of the shapes, subset, and `dst_start` do not match or exceed [`MAX_DIM`], or
///  - the region is out of bounds of either buffer.
pub fn copy_region(
    src: &[u8],
    src_shape: &[u64],
    src_subset: &ArraySubset,
    dst: &mut [u8],
    dst_shape: &[u64],
    dst_start: &[u64],
    itemsize: usize,
) {
    assert_eq!(src_shape.len(), src_subset.dimensionality());
    assert_eq!(dst_shape.len(), dst_start.len());
    assert_eq!(src_shape.len(), dst_shape.len());
    if src_subset.is_empty() {
        return;
    }

    let region = normalize(src_subset.shape(), 1);
    let src_shape = normalize(src_shape, 1);
    let src_start = normalize(src_subset.start(), 0);
    let dst_shape = normalize(dst_shape, 1);
    let dst_start = normalize(dst_start, 0);
    let src_strides = strides(&src_shape);
    let dst_strides = strides(&dst_shape);

    // Merge trailing dimensions that are spanned by the region in both arrays
    let mut inner = MAX_DIM - 1;
    let mut run = region[inner];
    while inner > 0 && region[inner] == src_shape[inner] && region[inner] == dst_shape[inner] {
        inner -= 1;
        run *= region[inner];
    }
    let run_bytes = to_usize(run) * itemsize;

    let outer_count: u64 = region[..inner].iter().product();
    let mut indices = [0u64; MAX_DIM];
    for _ in 0..outer_count {
        let mut src_offset = 0;
        let mut dst_offset = 0;
        for i in 0..=inner {
            src_offset += (src_start[i] + indices[i]) * src_strides[i];
            dst_offset += (dst_start[i] + indices[i]) * dst_strides[i];
        }
        let src_offset = to_usize(src_offset) * itemsize;
        let dst_offset = to_usize(dst_offset) * itemsize;
        dst[dst_offset..dst_offset + run_bytes]
            .copy_from_slice(&src[src_offset..src_offset + run_bytes]);

        let mut i = inner;
        while i > 0 {
            i -= 1;
            indices[i] += 1;
            if indices[i] < region[i] {
                break;
            }
            indices[i] = 0;
        }
    }
}
