//! The frame persistence format.
//!
//! A frame holds the encoded chunks of an array together with a header describing the array layout and codec.
//! All integers are little-endian.
//!
//! | Field | Size |
//! |---|---|
//! | magic `NDCHUNK\0` | 8 bytes |
//! | version | `u8` |
//! | header length | `u32` |
//! | header ([`FrameHeader`] as JSON) | header length bytes |
//! | number of chunks | `u64` |
//! | chunk index: offset and length of each chunk relative to the data section | 16 bytes per chunk |
//! | data section: the encoded chunks | |
//!
//! A frame is read from memory with [`Frame::from_bytes`] or from a file with [`Frame::open`] (chunks are read on demand) or [`Frame::load`] (the whole file is read).

use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::CodecConfiguration;

/// The magic bytes at the start of every frame.
pub const FRAME_MAGIC: &[u8; 8] = b"NDCHUNK\0";

/// The current frame format version.
pub const FRAME_VERSION: u8 = 1;

const PREAMBLE_SIZE: usize = FRAME_MAGIC.len() + 1 + 4;
const INDEX_ENTRY_SIZE: usize = 16;

/// A frame error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FrameError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// The frame header could not be serialised or deserialised.
    #[error(transparent)]
    InvalidHeader(#[from] serde_json::Error),
    /// The frame is malformed.
    #[error("invalid frame: {_0}")]
    Invalid(String),
    /// A chunk index is out of bounds.
    #[error("chunk index {index} is out of bounds for a frame with {count} chunks")]
    ChunkOutOfBounds {
        /// The chunk index.
        index: usize,
        /// The number of chunks in the frame.
        count: usize,
    },
}

/// The header of a frame, describing the array held in the frame.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(deny_unknown_fields)]
pub struct FrameHeader {
    /// The size of an element in bytes.
    pub itemsize: usize,
    /// The shape of the array.
    pub shape: Vec<u64>,
    /// The shape of a chunk.
    pub chunkshape: Vec<u64>,
    /// The shape of a block.
    pub blockshape: Vec<u64>,
    /// The codec encoding each chunk.
    pub codec: CodecConfiguration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ChunkRange {
    offset: u64,
    length: u64,
}

#[derive(Clone, Debug)]
enum FrameSource {
    Memory(Bytes),
    File(PathBuf),
}

/// A frame holding the encoded chunks of an array.
#[derive(Clone, Debug)]
pub struct Frame {
    header: FrameHeader,
    chunks: Vec<ChunkRange>,
    data_offset: u64,
    source: FrameSource,
}

impl Frame {
    /// Parse a frame held in memory.
    ///
    /// Chunks read from the frame are zero-copy slices of `bytes`.
    ///
    /// # Errors
    /// Returns a [`FrameError`] if the frame is malformed.
    pub fn from_bytes(bytes: Bytes) -> Result<Self, FrameError> {
        let mut reader = std::io::Cursor::new(bytes.as_ref());
        let (header, chunks, data_offset) = read_header_and_index(&mut reader)?;
        let data_size = (bytes.len() as u64).saturating_sub(data_offset);
        validate_chunk_ranges(&chunks, data_size)?;
        Ok(Self {
            header,
            chunks,
            data_offset,
            source: FrameSource::Memory(bytes),
        })
    }

    /// Open a frame file.
    ///
    /// Only the header and chunk index are read, chunks are read from the file on demand.
    ///
    /// # Errors
    /// Returns a [`FrameError`] if the file cannot be read or the frame is malformed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FrameError> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let (header, chunks, data_offset) = read_header_and_index(&mut file)?;
        validate_chunk_ranges(&chunks, file_size.saturating_sub(data_offset))?;
        Ok(Self {
            header,
            chunks,
            data_offset,
            source: FrameSource::File(path.to_path_buf()),
        })
    }

    /// Read a frame file into memory.
    ///
    /// # Errors
    /// Returns a [`FrameError`] if the file cannot be read or the frame is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FrameError> {
        Self::from_bytes(Bytes::from(std::fs::read(path)?))
    }

    /// Return the frame header.
    #[must_use]
    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    /// Return the number of chunks in the frame.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Returns true if the frame is held in memory rather than read from a file.
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        matches!(self.source, FrameSource::Memory(_))
    }

    /// Read the encoded chunk at `index`.
    ///
    /// # Errors
    /// Returns a [`FrameError`] if `index` is out of bounds or the frame file cannot be read.
    ///
    /// # Panics
    /// Panics if a chunk range exceeds [`usize::MAX`].
    pub fn read_chunk(&self, index: usize) -> Result<Bytes, FrameError> {
        let range = self
            .chunks
            .get(index)
            .ok_or(FrameError::ChunkOutOfBounds {
                index,
                count: self.chunks.len(),
            })?;
        let start = self.data_offset + range.offset;
        match &self.source {
            FrameSource::Memory(bytes) => {
                let start = usize::try_from(start).unwrap();
                let end = start + usize::try_from(range.length).unwrap();
                Ok(bytes.slice(start..end))
            }
            FrameSource::File(path) => {
                let mut file = File::open(path)?;
                file.seek(SeekFrom::Start(start))?;
                let mut chunk = vec![0; usize::try_from(range.length).unwrap()];
                file.read_exact(&mut chunk)?;
                Ok(Bytes::from(chunk))
            }
        }
    }
}

fn read_u64(reader: &mut impl Read) -> Result<u64, FrameError> {
    let mut buf = [0; 8];
    reader.read_exact(&mut buf).map_err(truncated)?;
    Ok(u64::from_le_bytes(buf))
}

fn truncated(err: std::io::Error) -> FrameError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        FrameError::Invalid("the frame is truncated".to_string())
    } else {
        FrameError::IOError(err)
    }
}

fn read_header_and_index(
    reader: &mut impl Read,
) -> Result<(FrameHeader, Vec<ChunkRange>, u64), FrameError> {
    let mut preamble = [0; PREAMBLE_SIZE];
    reader.read_exact(&mut preamble).map_err(truncated)?;
    if &preamble[..FRAME_MAGIC.len()] != FRAME_MAGIC {
        return Err(FrameError::Invalid("missing frame magic".to_string()));
    }
    let version = preamble[FRAME_MAGIC.len()];
    if version != FRAME_VERSION {
        return Err(FrameError::Invalid(format!(
            "unsupported frame version {version}"
        )));
    }
    let mut header_len = [0; 4];
    header_len.copy_from_slice(&preamble[FRAME_MAGIC.len() + 1..]);
    let header_len = u32::from_le_bytes(header_len);

    let mut header = Vec::new();
    reader
        .by_ref()
        .take(u64::from(header_len))
        .read_to_end(&mut header)?;
    if header.len() as u64 != u64::from(header_len) {
        return Err(FrameError::Invalid("the frame is truncated".to_string()));
    }
    let header: FrameHeader = serde_json::from_slice(&header)?;

    let nchunks = read_u64(reader)?;
    let mut chunks = Vec::new();
    for _ in 0..nchunks {
        let offset = read_u64(reader)?;
        let length = read_u64(reader)?;
        chunks.push(ChunkRange { offset, length });
    }

    let data_offset = PREAMBLE_SIZE as u64
        + u64::from(header_len)
        + 8
        + nchunks * INDEX_ENTRY_SIZE as u64;
    Ok((header, chunks, data_offset))
}

fn validate_chunk_ranges(chunks: &[ChunkRange], data_size: u64) -> Result<(), FrameError> {
    for (index, range) in chunks.iter().enumerate() {
        let end = range.offset.checked_add(range.length);
        if end.is_none_or(|end| end > data_size) {
            return Err(FrameError::Invalid(format!(
                "chunk {index} (offset {}, length {}) exceeds the data section of {data_size} bytes",
                range.offset, range.length
            )));
        }
    }
    Ok(())
}

/// Serialise a frame to bytes.
///
/// # Errors
/// Returns a [`FrameError`] if the header cannot be serialised.
pub fn serialize_frame<'a>(
    header: &FrameHeader,
    chunks: impl IntoIterator<Item = &'a [u8]>,
) -> Result<Vec<u8>, FrameError> {
    let mut frame = Vec::new();
    write_frame_to(&mut frame, header, chunks)?;
    Ok(frame)
}

/// Write a frame to a file at `path`, replacing it if it exists.
///
/// # Errors
/// Returns a [`FrameError`] if the header cannot be serialised or the file cannot be written.
pub fn write_frame<'a>(
    path: impl AsRef<Path>,
    header: &FrameHeader,
    chunks: impl IntoIterator<Item = &'a [u8]>,
) -> Result<(), FrameError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_frame_to(&mut writer, header, chunks)?;
    writer.flush()?;
    Ok(())
}

fn write_frame_to<'a>(
    writer: &mut impl Write,
    header: &FrameHeader,
    chunks: impl IntoIterator<Item = &'a [u8]>,
) -> Result<(), FrameError> {
    let chunks: Vec<&[u8]> = chunks.into_iter().collect();
    let header = serde_json::to_vec(header)?;
    let header_len = u32::try_from(header.len())
        .map_err(|_| FrameError::Invalid("the frame header is too large".to_string()))?;

    writer.write_all(FRAME_MAGIC)?;
    writer.write_all(&[FRAME_VERSION])?;
    writer.write_all(&header_len.to_le_bytes())?;
    writer.write_all(&header)?;
    writer.write_all(&(chunks.len() as u64).to_le_bytes())?;
    let mut offset = 0u64;
    for chunk in &chunks {
        let length = chunk.len() as u64;
        writer.write_all(&offset.to_le_bytes())?;
        writer.write_all(&length.to_le_bytes())?;
        offset += length;
    }
    for chunk in chunks {
        writer.write_all(chunk)?;
    }
    Ok(())
}
