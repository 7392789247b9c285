use itertools::Itertools;
use ndchunk_codec::CodecConfiguration;
use ndchunk_codec::frame::FrameHeader;

use super::ArrayError;
use crate::array_subset::ArraySubset;
use crate::dims::{Dims, MAX_DIM};
use crate::to_usize;

/// The validated shape of an array, its chunk grid, and its blocks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ArrayLayout {
    itemsize: usize,
    shape: Dims,
    chunkshape: Dims,
    blockshape: Dims,
    extshape: Dims,
}

impl ArrayLayout {
    /// Create the layout of a chunked array.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - `itemsize` is zero,
    ///  - the rank of `shape` is zero,
    ///  - the rank of `chunkshape` or `blockshape` differs from the rank of `shape`,
    ///  - `chunkshape` contains a zero,
    ///  - `blockshape` contains a zero or exceeds `chunkshape`, or
    ///  - the size in bytes of the extended shape or of a chunk overflows a [`usize`].
    pub(crate) fn new(
        itemsize: usize,
        shape: Dims,
        chunkshape: Dims,
        blockshape: Dims,
    ) -> Result<Self, ArrayError> {
        validate_shape(itemsize, &shape)?;
        for (what, dims) in [("chunk shape", &chunkshape), ("block shape", &blockshape)] {
            if dims.ndim() != shape.ndim() {
                return Err(ArrayError::IncompatibleDimensionality {
                    what,
                    got: dims.ndim(),
                    expected: shape.ndim(),
                });
            }
        }
        if chunkshape.contains(&0) {
            return Err(ArrayError::InvalidChunkShape(chunkshape));
        }
        if std::iter::zip(blockshape.iter(), chunkshape.iter())
            .any(|(&block, &chunk)| block == 0 || block > chunk)
        {
            return Err(ArrayError::InvalidBlockShape {
                blockshape,
                chunkshape,
            });
        }
        let overflow = || ArrayError::SizeOverflow {
            shape,
            chunkshape,
            itemsize,
        };
        let extshape = std::iter::zip(shape.iter(), chunkshape.iter())
            .map(|(&size, &chunk)| size.checked_next_multiple_of(chunk))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(overflow)?;
        let layout = Self {
            itemsize,
            shape,
            chunkshape,
            blockshape,
            extshape: Dims::new(&extshape)?,
        };
        layout.validate_size()?;
        Ok(layout)
    }

    /// Create the layout of a plain buffer array.
    ///
    /// The array has one chunk spanning the whole array.
    /// Zero extents are raised to one in the chunk shape, so a zero-volume array has no chunks.
    pub(crate) fn new_plain(itemsize: usize, shape: Dims) -> Result<Self, ArrayError> {
        validate_shape(itemsize, &shape)?;
        let chunkshape = shape.iter().map(|&size| size.max(1)).collect_vec();
        let chunkshape = Dims::new(&chunkshape)?;
        let layout = Self {
            itemsize,
            shape,
            chunkshape,
            blockshape: chunkshape,
            extshape: shape,
        };
        layout.validate_size()?;
        Ok(layout)
    }

    /// Check that the extended shape and the chunk shape have a size in bytes that fits in a [`usize`].
    ///
    /// The shape and the block shape are bounded by these, so every size getter is then overflow free.
    fn validate_size(&self) -> Result<(), ArrayError> {
        for dims in [&self.extshape, &self.chunkshape] {
            dims.checked_num_elements()
                .and_then(|num_elements| usize::try_from(num_elements).ok())
                .and_then(|num_elements| num_elements.checked_mul(self.itemsize))
                .ok_or(ArrayError::SizeOverflow {
                    shape: self.shape,
                    chunkshape: self.chunkshape,
                    itemsize: self.itemsize,
                })?;
        }
        Ok(())
    }

    pub(crate) fn itemsize(&self) -> usize {
        self.itemsize
    }

    pub(crate) fn shape(&self) -> &Dims {
        &self.shape
    }

    pub(crate) fn chunkshape(&self) -> &Dims {
        &self.chunkshape
    }

    pub(crate) fn blockshape(&self) -> &Dims {
        &self.blockshape
    }

    pub(crate) fn extshape(&self) -> &Dims {
        &self.extshape
    }

    pub(crate) fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    /// The number of elements of the array.
    pub(crate) fn size(&self) -> u64 {
        self.shape.num_elements()
    }

    /// The number of elements of a chunk.
    pub(crate) fn chunksize(&self) -> u64 {
        self.chunkshape.num_elements()
    }

    /// The number of elements of the chunk grid, including padding.
    pub(crate) fn extendedsize(&self) -> u64 {
        self.extshape.num_elements()
    }

    pub(crate) fn nchunks(&self) -> u64 {
        self.extendedsize() / self.chunksize()
    }

    /// The size of the array in bytes.
    pub(crate) fn size_bytes(&self) -> usize {
        to_usize(self.size()) * self.itemsize
    }

    /// The size of a chunk in bytes.
    pub(crate) fn chunk_size_bytes(&self) -> usize {
        to_usize(self.chunksize()) * self.itemsize
    }

    /// The size of a block in bytes.
    pub(crate) fn block_size_bytes(&self) -> usize {
        to_usize(self.blockshape.num_elements()) * self.itemsize
    }

    /// The number of chunks along each dimension.
    pub(crate) fn grid_shape(&self) -> Vec<u64> {
        std::iter::zip(self.extshape.iter(), self.chunkshape.iter())
            .map(|(&ext, &chunk)| ext / chunk)
            .collect()
    }

    /// The subset of the array covered by the chunk at `index`, clipped to the array shape.
    pub(crate) fn chunk_subset(&self, index: u64) -> ArraySubset {
        let grid_shape = self.grid_shape();
        let mut start = vec![0; self.ndim()];
        let mut rem = index;
        for i in (0..self.ndim()).rev() {
            start[i] = (rem % grid_shape[i]) * self.chunkshape[i];
            rem /= grid_shape[i];
        }
        let shape = itertools::izip!(&start, self.chunkshape.iter(), self.shape.iter())
            .map(|(&start, &chunk, &size)| chunk.min(size - start))
            .collect();
        // start and shape have the same length
        ArraySubset::new_with_start_shape(start, shape).unwrap_or_default()
    }

    /// The indices of the chunks overlapping `subset`, in row-major chunk-grid order.
    ///
    /// `subset` must be within the bounds of the array.
    pub(crate) fn chunks_in_subset(&self, subset: &ArraySubset) -> Vec<u64> {
        if subset.is_empty() {
            return Vec::new();
        }
        let grid_shape = self.grid_shape();
        let ranges = itertools::izip!(subset.start(), subset.end_exc(), self.chunkshape.iter())
            .map(|(&start, end, &chunk)| start / chunk..end.div_ceil(chunk))
            .collect_vec();
        ranges
            .into_iter()
            .multi_cartesian_product()
            .map(|indices| {
                std::iter::zip(indices, &grid_shape)
                    .fold(0, |linear, (index, &size)| linear * size + index)
            })
            .collect()
    }

    /// The layout with only the dimensions at `keep` retained.
    pub(crate) fn select_dims(&self, keep: &[usize]) -> Result<Self, ArrayError> {
        let select = |dims: &Dims| Dims::new(&keep.iter().map(|&i| dims[i]).collect_vec());
        Ok(Self {
            itemsize: self.itemsize,
            shape: select(&self.shape)?,
            chunkshape: select(&self.chunkshape)?,
            blockshape: select(&self.blockshape)?,
            extshape: select(&self.extshape)?,
        })
    }

    pub(crate) fn frame_header(&self, codec: CodecConfiguration) -> FrameHeader {
        FrameHeader {
            itemsize: self.itemsize,
            shape: self.shape.to_vec(),
            chunkshape: self.chunkshape.to_vec(),
            blockshape: self.blockshape.to_vec(),
            codec,
        }
    }
}

fn validate_shape(itemsize: usize, shape: &Dims) -> Result<(), ArrayError> {
    if itemsize == 0 {
        return Err(ArrayError::InvalidItemSize);
    }
    if shape.ndim() == 0 || shape.ndim() > MAX_DIM {
        return Err(ArrayError::InvalidRank(shape.ndim()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_layout() {
        let layout =
            ArrayLayout::new(8, [5, 6, 3].into(), [4, 3, 3].into(), [3, 3, 2].into()).unwrap();
        assert_eq!(layout.extshape().as_slice(), &[8, 6, 3]);
        assert_eq!(layout.size(), 90);
        assert_eq!(layout.chunksize(), 36);
        assert_eq!(layout.extendedsize(), 144);
        assert_eq!(layout.nchunks(), 4);
        assert_eq!(layout.grid_shape(), vec![2, 2, 1]);
        assert_eq!(layout.chunk_size_bytes(), 288);
        assert_eq!(layout.block_size_bytes(), 144);
        assert_eq!(
            layout.chunk_subset(3),
            ArraySubset::new_with_start_shape(vec![4, 3, 0], vec![1, 3, 3]).unwrap()
        );
    }

    #[test]
    fn array_layout_invalid() {
        assert!(matches!(
            ArrayLayout::new(0, [4].into(), [2].into(), [2].into()),
            Err(ArrayError::InvalidItemSize)
        ));
        assert!(matches!(
            ArrayLayout::new(1, [0u64; 0].into(), [0u64; 0].into(), [0u64; 0].into()),
            Err(ArrayError::InvalidRank(0))
        ));
        assert!(matches!(
            ArrayLayout::new(1, [4, 4].into(), [2].into(), [2].into()),
            Err(ArrayError::IncompatibleDimensionality { .. })
        ));
        assert!(matches!(
            ArrayLayout::new(1, [4].into(), [0].into(), [0].into()),
            Err(ArrayError::InvalidChunkShape(_))
        ));
        assert!(matches!(
            ArrayLayout::new(1, [4].into(), [2].into(), [3].into()),
            Err(ArrayError::InvalidBlockShape { .. })
        ));
        assert!(matches!(
            ArrayLayout::new(1, [4].into(), [2].into(), [0].into()),
            Err(ArrayError::InvalidBlockShape { .. })
        ));
    }

    #[test]
    fn array_layout_size_overflow() {
        assert!(matches!(
            ArrayLayout::new_plain(1, [1 << 32, 1 << 32].into()),
            Err(ArrayError::SizeOverflow { .. })
        ));
        assert!(matches!(
            ArrayLayout::new(1, [u64::MAX].into(), [2].into(), [2].into()),
            Err(ArrayError::SizeOverflow { .. })
        ));
        assert!(matches!(
            ArrayLayout::new(8, [1 << 62].into(), [1 << 62].into(), [1].into()),
            Err(ArrayError::SizeOverflow { .. })
        ));
        // A zero-volume array still needs an addressable chunk
        assert!(matches!(
            ArrayLayout::new(2, [0, u64::MAX].into(), [1, u64::MAX].into(), [1, 1].into()),
            Err(ArrayError::SizeOverflow { .. })
        ));
    }

    #[test]
    fn array_layout_plain() {
        let layout = ArrayLayout::new_plain(4, [3, 0, 2].into()).unwrap();
        assert_eq!(layout.chunkshape().as_slice(), &[3, 1, 2]);
        assert_eq!(layout.nchunks(), 0);
        let layout = ArrayLayout::new_plain(4, [3, 5].into()).unwrap();
        assert_eq!(layout.nchunks(), 1);
        assert_eq!(layout.chunk_size_bytes(), 60);
    }

    #[test]
    fn array_layout_chunks_in_subset() {
        let layout =
            ArrayLayout::new(1, [5, 6, 3].into(), [4, 3, 3].into(), [4, 3, 3].into()).unwrap();
        let subset = ArraySubset::new_with_start_end_exc(vec![3, 2, 0], vec![5, 4, 3]).unwrap();
        assert_eq!(layout.chunks_in_subset(&subset), vec![0, 1, 2, 3]);
        let subset = ArraySubset::new_with_start_end_exc(vec![4, 0, 1], vec![5, 3, 2]).unwrap();
        assert_eq!(layout.chunks_in_subset(&subset), vec![2]);
        let subset = ArraySubset::new_with_start_end_exc(vec![4, 0, 1], vec![4, 3, 2]).unwrap();
        assert!(layout.chunks_in_subset(&subset).is_empty());
    }

    #[test]
    fn array_layout_select_dims() {
        let layout =
            ArrayLayout::new(1, [1, 4, 1, 3].into(), [1, 2, 1, 2].into(), [1, 2, 1, 1].into())
                .unwrap();
        let squeezed = layout.select_dims(&[1, 3]).unwrap();
        assert_eq!(squeezed.shape().as_slice(), &[4, 3]);
        assert_eq!(squeezed.chunkshape().as_slice(), &[2, 2]);
        assert_eq!(squeezed.blockshape().as_slice(), &[2, 1]);
        assert_eq!(squeezed.extshape().as_slice(), &[4, 4]);
        assert_eq!(squeezed.nchunks(), layout.nchunks());
    }
}
