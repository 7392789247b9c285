use std::sync::Arc;

use super::{Array, ArrayError, ArrayParams, Storage};
use crate::context::Context;
use crate::to_usize;

fn validate_element_size<T>(itemsize: usize) -> Result<(), ArrayError> {
    if size_of::<T>() == itemsize {
        Ok(())
    } else {
        Err(ArrayError::IncompatibleElementType(size_of::<T>(), itemsize))
    }
}

impl Array {
    /// Create an array filled with the row-major `elements`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the size of `T` does not match the item size or [`Array::from_buffer`] fails.
    pub fn from_elements<T: bytemuck::Pod>(
        context: &Arc<Context>,
        params: &ArrayParams,
        storage: &Storage,
        elements: &[T],
    ) -> Result<Self, ArrayError> {
        validate_element_size::<T>(params.itemsize)?;
        Self::from_buffer(context, params, storage, bytemuck::cast_slice(elements))
    }

    /// Append the next chunk of the array from its row-major `elements`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the size of `T` does not match the item size or [`Array::append`] fails.
    pub fn append_elements<T: bytemuck::Pod>(&mut self, elements: &[T]) -> Result<(), ArrayError> {
        validate_element_size::<T>(self.itemsize())?;
        self.append(bytemuck::cast_slice(elements))
    }

    /// Return the row-major elements of the array.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the size of `T` does not match the item size or [`Array::to_buffer`] fails.
    ///
    /// # Panics
    /// Panics if the number of elements exceeds [`usize::MAX`].
    pub fn to_elements<T: bytemuck::Pod>(&self) -> Result<Vec<T>, ArrayError> {
        validate_element_size::<T>(self.itemsize())?;
        let mut elements = vec![T::zeroed(); to_usize(self.size())];
        self.to_buffer(bytemuck::cast_slice_mut(&mut elements))?;
        Ok(elements)
    }
}
