use std::borrow::Cow;
use std::path::PathBuf;

use bytes::Bytes;
use ndchunk_codec::frame::{Frame, FrameError, serialize_frame, write_frame};
use ndchunk_codec::{Codec, CodecConfiguration, CodecError, CodecOptions};
use rayon::prelude::*;
use rayon_iter_concurrent_limit::iter_concurrent_limit;

use super::{ArrayBackend, BackendKind, RegionReader};
use crate::array::{ArrayError, ArrayLayout};
use crate::array_subset::{ArraySubset, copy_region};
use crate::context::Context;
use crate::to_usize;

/// The encoded chunks of a chunked array.
#[derive(Clone, Debug)]
enum ChunkStore {
    /// Chunks held individually.
    Owned(Vec<Bytes>),
    /// Chunks held in a frame, in memory or in a file.
    Frame(Frame),
}

/// A backend storing independently encoded chunks.
#[derive(Debug)]
pub(crate) struct ChunkedBackend {
    codec: Codec,
    chunks: ChunkStore,
    filename: Option<PathBuf>,
    enforce_frame: bool,
}

impl ChunkedBackend {
    pub(crate) fn new(codec: Codec, filename: Option<PathBuf>, enforce_frame: bool) -> Self {
        Self {
            codec,
            chunks: ChunkStore::Owned(Vec::new()),
            filename,
            enforce_frame,
        }
    }

    /// Create a backend holding the chunks of `frame`.
    pub(crate) fn from_frame(codec: Codec, frame: Frame) -> Self {
        Self {
            codec,
            chunks: ChunkStore::Frame(frame),
            filename: None,
            enforce_frame: false,
        }
    }

    /// Create a backend holding `chunks`.
    pub(crate) fn from_chunks(codec: Codec, chunks: Vec<Bytes>) -> Self {
        Self {
            codec,
            chunks: ChunkStore::Owned(chunks),
            filename: None,
            enforce_frame: false,
        }
    }

    fn num_chunks_written(&self) -> u64 {
        match &self.chunks {
            ChunkStore::Owned(chunks) => chunks.len() as u64,
            ChunkStore::Frame(frame) => frame.chunk_count() as u64,
        }
    }

    /// Return the encoded chunks, reading them from the frame if necessary.
    fn chunk_vec(&self) -> Result<Vec<Bytes>, ArrayError> {
        match &self.chunks {
            ChunkStore::Owned(chunks) => Ok(chunks.clone()),
            ChunkStore::Frame(frame) => Ok((0..frame.chunk_count())
                .map(|index| frame.read_chunk(index))
                .collect::<Result<Vec<_>, _>>()?),
        }
    }

    fn encode_chunk(&self, chunk: &[u8], options: &CodecOptions) -> Result<Bytes, ArrayError> {
        Ok(match self.codec.encode(Cow::Borrowed(chunk), options)? {
            Cow::Borrowed(encoded) => Bytes::copy_from_slice(encoded),
            Cow::Owned(encoded) => Bytes::from(encoded),
        })
    }

    fn decode_chunk(
        &self,
        index: u64,
        layout: &ArrayLayout,
        options: &CodecOptions,
    ) -> Result<Bytes, ArrayError> {
        let encoded = self.encoded_chunk(index)?;
        let chunk_size = layout.chunk_size_bytes();
        let decoded = match self
            .codec
            .decode(Cow::Borrowed(&encoded), chunk_size, options)?
        {
            Cow::Borrowed(_) => encoded.clone(),
            Cow::Owned(decoded) => Bytes::from(decoded),
        };
        if decoded.len() == chunk_size {
            Ok(decoded)
        } else {
            Err(CodecError::UnexpectedDecodedSize {
                got: decoded.len(),
                expected: chunk_size,
            }
            .into())
        }
    }

    fn write_chunks_to_frame(&mut self, layout: &ArrayLayout) -> Result<(), ArrayError> {
        let header = layout.frame_header(self.codec.configuration());
        if let Some(filename) = self.filename.clone() {
            let chunks = self.chunk_vec()?;
            write_frame(&filename, &header, chunks.iter().map(|chunk| &chunk[..]))?;
            log::debug!(
                "wrote {} chunks to the frame {}",
                chunks.len(),
                filename.display()
            );
            self.chunks = ChunkStore::Frame(Frame::open(&filename)?);
        } else if self.enforce_frame {
            let chunks = self.chunk_vec()?;
            let frame = serialize_frame(&header, chunks.iter().map(|chunk| &chunk[..]))?;
            log::debug!(
                "consolidated {} chunks into a frame of {} bytes",
                chunks.len(),
                frame.len()
            );
            self.chunks = ChunkStore::Frame(Frame::from_bytes(Bytes::from(frame))?);
        }
        Ok(())
    }
}

impl ArrayBackend for ChunkedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Chunked
    }

    fn append(
        &mut self,
        context: &Context,
        layout: &ArrayLayout,
        index: u64,
        chunk: &[u8],
    ) -> Result<(), ArrayError> {
        let (_, options) =
            context.chunk_concurrency(1, layout.itemsize(), layout.block_size_bytes());
        let encoded = self.encode_chunk(chunk, &options)?;
        log::trace!(
            "encoded chunk {index} from {} to {} bytes",
            chunk.len(),
            encoded.len()
        );
        if let ChunkStore::Owned(chunks) = &mut self.chunks {
            chunks.push(encoded);
        } else {
            let mut chunks = self.chunk_vec()?;
            chunks.push(encoded);
            self.chunks = ChunkStore::Owned(chunks);
        }
        Ok(())
    }

    fn fill(
        &mut self,
        context: &Context,
        layout: &ArrayLayout,
        reader: &RegionReader<'_>,
    ) -> Result<(), ArrayError> {
        let num_chunks = to_usize(layout.nchunks());
        let chunk_size = layout.chunk_size_bytes();
        let (chunk_concurrency, options) =
            context.chunk_concurrency(num_chunks, layout.itemsize(), layout.block_size_bytes());
        let allocator = context.allocator();
        let encode_chunk = |index: usize| -> Result<Bytes, ArrayError> {
            let mut chunk = allocator
                .allocate(chunk_size)
                .ok_or(ArrayError::AllocationFailed(chunk_size))?;
            let subset = layout.chunk_subset(index as u64);
            let encoded = reader(&subset, &mut chunk, layout.chunkshape())
                .and_then(|()| self.encode_chunk(&chunk, &options));
            allocator.release(chunk);
            encoded
        };
        let chunks = iter_concurrent_limit!(chunk_concurrency, 0..num_chunks, map, encode_chunk)
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!(
            "encoded {} chunks with {} to {} bytes",
            chunks.len(),
            self.codec.identifier(),
            chunks.iter().map(Bytes::len).sum::<usize>()
        );
        self.chunks = ChunkStore::Owned(chunks);
        Ok(())
    }

    fn fill_encoded(
        &mut self,
        _layout: &ArrayLayout,
        chunks: Vec<Bytes>,
    ) -> Result<(), ArrayError> {
        self.chunks = ChunkStore::Owned(chunks);
        Ok(())
    }

    fn read_region(
        &self,
        context: &Context,
        layout: &ArrayLayout,
        region: &ArraySubset,
        dest: &mut [u8],
        dest_shape: &[u64],
    ) -> Result<(), ArrayError> {
        let chunk_indices = layout.chunks_in_subset(region);
        if let Some(&index) = chunk_indices
            .iter()
            .find(|&&index| index >= self.num_chunks_written())
        {
            return Err(ArrayError::ChunkNotWritten(index));
        }
        let (chunk_concurrency, options) = context.chunk_concurrency(
            chunk_indices.len(),
            layout.itemsize(),
            layout.block_size_bytes(),
        );

        // Decode in batches to bound the memory held by decoded chunks
        for batch in chunk_indices.chunks(chunk_concurrency) {
            let decoded_chunks = iter_concurrent_limit!(
                chunk_concurrency,
                batch.to_vec(),
                map,
                |index: u64| -> Result<(u64, Bytes), ArrayError> {
                    Ok((index, self.decode_chunk(index, layout, &options)?))
                }
            )
            .collect::<Result<Vec<_>, _>>()?;

            for (index, decoded) in decoded_chunks {
                let chunk_subset = layout.chunk_subset(index);
                let overlap = chunk_subset.overlap(region)?;
                copy_region(
                    &decoded,
                    layout.chunkshape(),
                    &overlap.relative_to(chunk_subset.start())?,
                    dest,
                    dest_shape,
                    overlap.relative_to(region.start())?.start(),
                    layout.itemsize(),
                );
            }
        }
        Ok(())
    }

    fn reshape(
        &self,
        _context: &Context,
        _layout: &ArrayLayout,
    ) -> Result<Box<dyn ArrayBackend>, ArrayError> {
        Ok(Box::new(Self::new(
            self.codec.clone(),
            self.filename.clone(),
            self.enforce_frame,
        )))
    }

    fn squeeze(
        &mut self,
        context: &Context,
        old_layout: &ArrayLayout,
        layout: &ArrayLayout,
        keep: &[usize],
    ) -> Result<(), ArrayError> {
        let reencode = (0..old_layout.ndim())
            .any(|i| !keep.contains(&i) && old_layout.chunkshape()[i] > 1);
        if !reencode {
            return Ok(());
        }

        // The retained part of each chunk has the extent of the old chunk shape in the kept dimensions and 1 elsewhere
        let old_chunkshape = old_layout.chunkshape();
        let retained_shape: Vec<u64> = (0..old_layout.ndim())
            .map(|i| if keep.contains(&i) { old_chunkshape[i] } else { 1 })
            .collect();
        let retained = ArraySubset::new_with_shape(retained_shape.clone());
        let chunk_size = layout.chunk_size_bytes();
        let num_chunks = to_usize(self.num_chunks_written());
        let (chunk_concurrency, options) =
            context.chunk_concurrency(num_chunks, layout.itemsize(), layout.block_size_bytes());
        let reencode_chunk = |index: usize| -> Result<Bytes, ArrayError> {
            let decoded = self.decode_chunk(index as u64, old_layout, &options)?;
            let mut chunk = vec![0; chunk_size];
            copy_region(
                &decoded,
                old_chunkshape,
                &retained,
                &mut chunk,
                &retained_shape,
                &vec![0; retained_shape.len()],
                layout.itemsize(),
            );
            self.encode_chunk(&chunk, &options)
        };
        let chunks = iter_concurrent_limit!(chunk_concurrency, 0..num_chunks, map, reencode_chunk)
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!(
            "re-encoded {} chunks to squeeze the chunk shape {old_chunkshape} to {}",
            chunks.len(),
            layout.chunkshape()
        );
        self.chunks = ChunkStore::Owned(chunks);
        Ok(())
    }

    fn encoded_chunk(&self, index: u64) -> Result<Bytes, ArrayError> {
        match &self.chunks {
            ChunkStore::Owned(chunks) => usize::try_from(index)
                .ok()
                .and_then(|index| chunks.get(index))
                .cloned()
                .ok_or(ArrayError::ChunkNotWritten(index)),
            ChunkStore::Frame(frame) => {
                let chunk_index =
                    usize::try_from(index).map_err(|_| ArrayError::ChunkNotWritten(index))?;
                frame.read_chunk(chunk_index).map_err(|err| {
                    if matches!(err, FrameError::ChunkOutOfBounds { .. }) {
                        ArrayError::ChunkNotWritten(index)
                    } else {
                        err.into()
                    }
                })
            }
        }
    }

    fn codec_configuration(&self) -> Option<CodecConfiguration> {
        Some(self.codec.configuration())
    }

    fn finalize(&mut self, layout: &ArrayLayout) -> Result<(), ArrayError> {
        self.write_chunks_to_frame(layout)
    }

    fn discard_chunk(&mut self, index: u64) {
        // Appending always leaves the chunks owned
        if let ChunkStore::Owned(chunks) = &mut self.chunks {
            chunks.truncate(to_usize(index));
        }
    }
}
