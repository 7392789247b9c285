use super::{Array, ArrayError, ArrayLayout, ArrayParams, BackendKind, Storage};
use crate::array_subset::ArraySubset;
use crate::dims::Dims;

impl Array {
    /// Return the subset of the array from `start` to `stop` (exclusive).
    fn region(&self, start: &[u64], stop: &[u64]) -> Result<ArraySubset, ArrayError> {
        for (what, dims) in [("slice start", start), ("slice stop", stop)] {
            if dims.len() != self.ndim() {
                return Err(ArrayError::IncompatibleDimensionality {
                    what,
                    got: dims.len(),
                    expected: self.ndim(),
                });
            }
        }
        let region = ArraySubset::new_with_start_end_exc(start.to_vec(), stop.to_vec())?;
        if region.inbounds_shape(self.shape()) {
            Ok(region)
        } else {
            Err(ArrayError::InvalidArraySubset(region, self.shape().to_vec()))
        }
    }

    /// Return the layout of this array with a new shape and the same chunk and block shape.
    fn layout_with_shape(&self, shape: Dims) -> Result<ArrayLayout, ArrayError> {
        match self.backend() {
            BackendKind::Chunked => ArrayLayout::new(
                self.itemsize(),
                shape,
                *self.chunkshape(),
                *self.blockshape(),
            ),
            BackendKind::PlainBuffer => ArrayLayout::new_plain(self.itemsize(), shape),
        }
    }

    /// Fill `dest` with the region of the array from `start` to `stop` (exclusive).
    ///
    /// `dest` is reshaped to the shape of the region.
    /// A chunked `dest` keeps its chunk shape and block shape.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - `start` or `stop` do not match the rank of the array,
    ///  - the region is not within the bounds of the array,
    ///  - `dest` already holds data, or its rank or item size differs from the array,
    ///  - a needed chunk of the array has not been written, or
    ///  - a chunk cannot be decoded or encoded.
    ///
    /// `dest` is unchanged if an error occurs.
    pub fn get_slice(&self, dest: &mut Self, start: &[u64], stop: &[u64]) -> Result<(), ArrayError> {
        let region = self.region(start, stop)?;
        dest.ensure_empty()?;
        if dest.ndim() != self.ndim() {
            return Err(ArrayError::IncompatibleDimensionality {
                what: "slice destination",
                got: dest.ndim(),
                expected: self.ndim(),
            });
        }
        if dest.itemsize() != self.itemsize() {
            return Err(ArrayError::IncompatibleElementType(
                dest.itemsize(),
                self.itemsize(),
            ));
        }
        let layout = dest.layout_with_shape(Dims::new(region.shape())?)?;

        let reader = |subset: &ArraySubset,
                      buffer: &mut [u8],
                      buffer_shape: &[u64]|
         -> Result<(), ArrayError> {
            // Offset the subset of the slice by the start of the region
            let subset = ArraySubset::new_with_start_shape(
                std::iter::zip(subset.start(), region.start())
                    .map(|(a, b)| a + b)
                    .collect(),
                subset.shape().to_vec(),
            )?;
            self.backend
                .read_region(&self.context, &self.layout, &subset, buffer, buffer_shape)
        };
        dest.fill_with(layout, &reader)
    }

    /// Return a new array holding the region of the array from `start` to `stop` (exclusive).
    ///
    /// The new array is created with `storage` and the context of this array.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the array cannot be created or [`Array::get_slice`] fails.
    pub fn slice(&self, start: &[u64], stop: &[u64], storage: &Storage) -> Result<Self, ArrayError> {
        let region = self.region(start, stop)?;
        let params = ArrayParams::new(self.itemsize(), Dims::new(region.shape())?);
        let mut dest = Self::empty(&self.context, &params, storage)?;
        self.get_slice(&mut dest, start, stop)?;
        Ok(dest)
    }

    /// Copy the region of the array from `start` to `stop` (exclusive) to the origin of `dest`.
    ///
    /// `dest` is a row-major buffer with `dest_shape`, which must be at least the shape of the region in each dimension.
    /// Elements of `dest` outside of the region are unchanged.
    /// Only the chunks overlapping the region are decoded.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - `start`, `stop`, or `dest_shape` do not match the rank of the array,
    ///  - the region is not within the bounds of the array,
    ///  - `dest_shape` cannot hold the region or the length of `dest` does not match `dest_shape`,
    ///  - a needed chunk of the array has not been written, or
    ///  - a chunk cannot be decoded.
    pub fn get_slice_buffer(
        &self,
        start: &[u64],
        stop: &[u64],
        dest_shape: &[u64],
        dest: &mut [u8],
    ) -> Result<(), ArrayError> {
        let region = self.region(start, stop)?;
        if dest_shape.len() != self.ndim() {
            return Err(ArrayError::IncompatibleDimensionality {
                what: "destination shape",
                got: dest_shape.len(),
                expected: self.ndim(),
            });
        }
        if std::iter::zip(dest_shape, region.shape()).any(|(dest, region)| dest < region) {
            return Err(ArrayError::InvalidDestinationShape {
                dest_shape: dest_shape.to_vec(),
                region_shape: region.shape().to_vec(),
            });
        }
        // An overflowing destination shape cannot match any buffer length
        let expected = dest_shape
            .iter()
            .try_fold(self.itemsize() as u64, |acc, &dim| acc.checked_mul(dim))
            .unwrap_or(u64::MAX);
        if dest.len() as u64 != expected {
            return Err(ArrayError::InvalidBytesInputSize(dest.len(), expected));
        }
        self.backend
            .read_region(&self.context, &self.layout, &region, dest, dest_shape)
    }

    /// Return the bytes of the region of the array from `start` to `stop` (exclusive) without copying.
    ///
    /// Only plain buffer arrays support this operation, and the region must be one contiguous run of elements.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - `start` or `stop` do not match the rank of the array,
    ///  - the region is not within the bounds of the array,
    ///  - the array is not a plain buffer array, or
    ///  - the region is not contiguous.
    pub fn get_slice_buffer_no_copy(&self, start: &[u64], stop: &[u64]) -> Result<&[u8], ArrayError> {
        let region = self.region(start, stop)?;
        self.backend.contiguous_bytes(&self.layout, &region)
    }

    /// Write `src` to the region of the array from `start` to `stop` (exclusive).
    ///
    /// `src` is a row-major buffer with the shape of the region.
    /// Only plain buffer arrays support this operation.
    /// The number of written chunks and the filled state are unchanged.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - `start` or `stop` do not match the rank of the array,
    ///  - the region is not within the bounds of the array,
    ///  - the length of `src` is not the size of the region in bytes, or
    ///  - the array is not a plain buffer array.
    pub fn set_slice_buffer(
        &mut self,
        start: &[u64],
        stop: &[u64],
        src: &[u8],
    ) -> Result<(), ArrayError> {
        let region = self.region(start, stop)?;
        let expected = region.num_elements() * self.itemsize() as u64;
        if src.len() as u64 != expected {
            return Err(ArrayError::InvalidBytesInputSize(src.len(), expected));
        }
        self.backend.write_region(&self.layout, &region, src)
    }
}
