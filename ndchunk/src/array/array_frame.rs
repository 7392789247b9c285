use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use ndchunk_codec::Codec;
use ndchunk_codec::frame::{Frame, FrameHeader, serialize_frame, write_frame};

use super::backend::ChunkedBackend;
use super::{Array, ArrayError, ArrayLayout};
use crate::context::Context;
use crate::dims::Dims;

impl Array {
    /// Create a chunked array from a frame.
    ///
    /// If `copy` is true, the encoded chunks are copied out of the frame into the array.
    /// Otherwise, the array holds the frame and reads chunks from it, sharing the memory of an in-memory frame or reading a file frame on demand.
    ///
    /// The codec of the array is the codec recorded in the frame rather than the codec of `context`.
    /// The array is filled if the frame holds every chunk of the array.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - the layout recorded in the frame is invalid,
    ///  - the frame holds more chunks than the array,
    ///  - the codec recorded in the frame is not supported, or
    ///  - a chunk cannot be read from the frame.
    pub fn from_frame(context: &Arc<Context>, frame: Frame, copy: bool) -> Result<Self, ArrayError> {
        let header = frame.header();
        let layout = ArrayLayout::new(
            header.itemsize,
            Dims::new(&header.shape)?,
            Dims::new(&header.chunkshape)?,
            Dims::new(&header.blockshape)?,
        )?;
        let nparts = frame.chunk_count() as u64;
        if nparts > layout.nchunks() {
            return Err(ArrayError::InvalidFrame(format!(
                "the frame holds {nparts} chunks, but an array with shape {} and chunk shape {} has {}",
                layout.shape(),
                layout.chunkshape(),
                layout.nchunks()
            )));
        }
        let codec = Codec::from_configuration(&header.codec)?;
        let backend = if copy {
            let chunks = (0..frame.chunk_count())
                .map(|index| {
                    frame
                        .read_chunk(index)
                        .map(|chunk| Bytes::copy_from_slice(&chunk))
                })
                .collect::<Result<Vec<_>, _>>()?;
            ChunkedBackend::from_chunks(codec, chunks)
        } else {
            ChunkedBackend::from_frame(codec, frame)
        };
        log::debug!(
            "created an array with shape {} and {nparts} of {} chunks from a frame",
            layout.shape(),
            layout.nchunks()
        );
        Ok(Self {
            context: context.clone(),
            filled: nparts == layout.nchunks(),
            layout,
            backend: Box::new(backend),
            nparts,
        })
    }

    /// Create a chunked array from a serialised frame.
    ///
    /// If `copy` is false, the array shares the memory of `sframe`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the frame is malformed or [`Array::from_frame`] fails.
    pub fn from_sframe(
        context: &Arc<Context>,
        sframe: impl Into<Bytes>,
        copy: bool,
    ) -> Result<Self, ArrayError> {
        Self::from_frame(context, Frame::from_bytes(sframe.into())?, copy)
    }

    /// Create a chunked array from a frame file.
    ///
    /// If `copy` is true, the file is read into memory.
    /// Otherwise, chunks are read from the file on demand.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the file cannot be read, the frame is malformed, or [`Array::from_frame`] fails.
    pub fn from_file(
        context: &Arc<Context>,
        path: impl AsRef<Path>,
        copy: bool,
    ) -> Result<Self, ArrayError> {
        let frame = if copy {
            Frame::load(path)?
        } else {
            Frame::open(path)?
        };
        Self::from_frame(context, frame, false)
    }

    /// Return the encoded chunks written to the array and the frame header describing them.
    fn frame_parts(
        &self,
        operation: &'static str,
    ) -> Result<(FrameHeader, Vec<Bytes>), ArrayError> {
        let codec = self
            .backend
            .codec_configuration()
            .ok_or_else(|| self.backend.unsupported(operation))?;
        let chunks = (0..self.nparts)
            .map(|index| self.backend.encoded_chunk(index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((self.layout.frame_header(codec), chunks))
    }

    /// Serialise the array to a frame.
    ///
    /// The frame holds the chunks written to the array.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the array is not chunked or a chunk cannot be read.
    pub fn to_sframe(&self) -> Result<Vec<u8>, ArrayError> {
        let (header, chunks) = self.frame_parts("to_sframe")?;
        Ok(serialize_frame(&header, chunks.iter().map(|chunk| &chunk[..]))?)
    }

    /// Write the array to a frame file at `path`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the array is not chunked, a chunk cannot be read, or the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ArrayError> {
        let (header, chunks) = self.frame_parts("save")?;
        write_frame(path, &header, chunks.iter().map(|chunk| &chunk[..]))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndchunk_codec::CodecConfiguration;

    use super::*;
    use crate::array::{ArrayParams, ChunkedStorage, ErrorKind, Storage};
    use crate::context::ContextConfig;

    #[test]
    fn array_sframe() -> Result<(), Box<dyn std::error::Error>> {
        let context = Context::new(ContextConfig::default().with_codec(CodecConfiguration::Bytes))?;
        let data: Vec<u8> = (0..60).collect();
        let array = Array::from_buffer(
            &context,
            &ArrayParams::new(2, [5, 6]),
            &ChunkedStorage::new([2, 4], [2, 4]).into(),
            &data,
        )?;
        let sframe = Bytes::from(array.to_sframe()?);
        for copy in [false, true] {
            let array = Array::from_sframe(&context, sframe.clone(), copy)?;
            assert!(array.filled());
            assert_eq!(array.nparts(), 6);
            assert_eq!(array.chunkshape().as_slice(), &[2, 4]);
            assert_eq!(array.to_vec()?, data);
        }

        let plain = Array::from_buffer(
            &context,
            &ArrayParams::new(2, [5, 6]),
            &Storage::PlainBuffer,
            &data,
        )?;
        assert_eq!(plain.to_sframe().unwrap_err().kind(), ErrorKind::InvalidStorage);
        Ok(())
    }

    #[test]
    fn array_sframe_partial() -> Result<(), Box<dyn std::error::Error>> {
        let context = Context::new(ContextConfig::default().with_codec(CodecConfiguration::Bytes))?;
        let mut array = Array::empty(
            &context,
            &ArrayParams::new(1, [4]),
            &ChunkedStorage::new([2], [2]).into(),
        )?;
        array.append(&[1, 2])?;
        let mut array = Array::from_sframe(&context, array.to_sframe()?, false)?;
        assert_eq!(array.nparts(), 1);
        assert!(!array.filled());
        array.append(&[3, 4])?;
        assert!(array.filled());
        assert_eq!(array.to_vec()?, vec![1, 2, 3, 4]);
        Ok(())
    }
}
