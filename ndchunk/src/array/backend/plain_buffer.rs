use std::sync::Arc;

use super::{ArrayBackend, BackendKind, RegionReader};
use crate::array::{ArrayError, ArrayLayout};
use crate::array_subset::{ArraySubset, copy_region};
use crate::context::{BufferAllocator, Context};
use crate::dims::{linear_offset, normalize};
use crate::to_usize;

/// A backend storing the array in one flat, unencoded row-major buffer.
///
/// The buffer is allocated by the allocator of the context and returned to it on drop.
#[derive(Debug)]
pub(crate) struct PlainBufferBackend {
    allocator: Arc<dyn BufferAllocator>,
    buffer: Option<Vec<u8>>,
}

impl PlainBufferBackend {
    pub(crate) fn new(context: &Context, layout: &ArrayLayout) -> Result<Self, ArrayError> {
        let size = layout.size_bytes();
        let buffer = context
            .allocator()
            .allocate(size)
            .ok_or(ArrayError::AllocationFailed(size))?;
        Ok(Self {
            allocator: context.config().allocator().clone(),
            buffer: Some(buffer),
        })
    }

    fn buffer(&self) -> &[u8] {
        self.buffer.as_deref().unwrap_or_default()
    }

    fn buffer_mut(&mut self) -> &mut [u8] {
        self.buffer.as_deref_mut().unwrap_or_default()
    }
}

impl Drop for PlainBufferBackend {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.allocator.release(buffer);
        }
    }
}

impl ArrayBackend for PlainBufferBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::PlainBuffer
    }

    fn append(
        &mut self,
        _context: &Context,
        _layout: &ArrayLayout,
        _index: u64,
        chunk: &[u8],
    ) -> Result<(), ArrayError> {
        // The only chunk spans the whole array
        self.buffer_mut().copy_from_slice(chunk);
        Ok(())
    }

    fn fill(
        &mut self,
        _context: &Context,
        layout: &ArrayLayout,
        reader: &RegionReader<'_>,
    ) -> Result<(), ArrayError> {
        let shape = layout.shape().to_vec();
        reader(
            &ArraySubset::new_with_shape(shape.clone()),
            self.buffer_mut(),
            &shape,
        )
    }

    fn read_region(
        &self,
        _context: &Context,
        layout: &ArrayLayout,
        region: &ArraySubset,
        dest: &mut [u8],
        dest_shape: &[u64],
    ) -> Result<(), ArrayError> {
        copy_region(
            self.buffer(),
            layout.shape(),
            region,
            dest,
            dest_shape,
            &vec![0; dest_shape.len()],
            layout.itemsize(),
        );
        Ok(())
    }

    fn write_region(
        &mut self,
        layout: &ArrayLayout,
        region: &ArraySubset,
        src: &[u8],
    ) -> Result<(), ArrayError> {
        copy_region(
            src,
            region.shape(),
            &ArraySubset::new_with_shape(region.shape().to_vec()),
            self.buffer_mut(),
            layout.shape(),
            region.start(),
            layout.itemsize(),
        );
        Ok(())
    }

    fn contiguous_bytes(
        &self,
        layout: &ArrayLayout,
        region: &ArraySubset,
    ) -> Result<&[u8], ArrayError> {
        if !region.is_contiguous_in(layout.shape()) {
            return Err(ArrayError::NonContiguousSlice(region.clone()));
        }
        let offset = if region.is_empty() {
            0
        } else {
            linear_offset(&normalize(region.start(), 0), &layout.shape().normalize(1))
        };
        let offset = to_usize(offset) * layout.itemsize();
        let len = to_usize(region.num_elements()) * layout.itemsize();
        Ok(&self.buffer()[offset..offset + len])
    }

    fn reshape(
        &self,
        context: &Context,
        layout: &ArrayLayout,
    ) -> Result<Box<dyn ArrayBackend>, ArrayError> {
        Ok(Box::new(Self::new(context, layout)?))
    }

    fn squeeze(
        &mut self,
        _context: &Context,
        _old_layout: &ArrayLayout,
        _layout: &ArrayLayout,
        _keep: &[usize],
    ) -> Result<(), ArrayError> {
        // Removing singleton dimensions does not change the row-major order of the elements
        Ok(())
    }
}
