//! The `blosc` codec.
//!
//! Compresses chunks with [c-blosc](https://github.com/Blosc/c-blosc).
//! Blosc splits a chunk into blocks of a configurable size and compresses each block independently, optionally after shuffling the bytes (or bits) of its elements.
//!
//! ### Codec Configuration Example - [`BloscCodecConfiguration`]:
//! ```rust
//! # let JSON = r#"
//! {
//!     "name": "blosc",
//!     "cname": "zstd",
//!     "clevel": 5,
//!     "shuffle": "bitshuffle",
//!     "typesize": 4,
//!     "blocksize": 0
//! }
//! # "#;
//! # use ndchunk_codec::CodecConfiguration;
//! # serde_json::from_str::<CodecConfiguration>(JSON).unwrap();
//! ```

mod blosc_codec;

use std::ffi::{c_char, c_int, c_void};

pub use blosc_codec::BloscCodec;
use blosc_src::{
    BLOSC_BLOSCLZ_COMPNAME, BLOSC_LZ4_COMPNAME, BLOSC_LZ4HC_COMPNAME, BLOSC_MAX_OVERHEAD,
    BLOSC_SNAPPY_COMPNAME, BLOSC_ZLIB_COMPNAME, BLOSC_ZSTD_COMPNAME, blosc_cbuffer_validate,
    blosc_compress_ctx, blosc_decompress_ctx,
};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The identifier for the `blosc` codec.
pub const IDENTIFIER: &str = "blosc";

#[allow(clippy::cast_possible_truncation)]
const BLOSC_OVERHEAD: usize = BLOSC_MAX_OVERHEAD as usize;

/// An error from the blosc library.
#[derive(Clone, Debug, Error, From)]
#[error("{0}")]
pub struct BloscError(String);

impl From<&str> for BloscError {
    fn from(err: &str) -> Self {
        Self(err.to_string())
    }
}

/// The compression level of the `blosc` codec.
///
/// An integer from 0 to 9.
/// A level of 0 disables compression.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display)]
pub struct BloscCompressionLevel(u8);

impl TryFrom<u8> for BloscCompressionLevel {
    type Error = u8;
    fn try_from(level: u8) -> Result<Self, Self::Error> {
        if level <= 9 { Ok(Self(level)) } else { Err(level) }
    }
}

impl BloscCompressionLevel {
    /// The underlying integer compression level.
    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        self.0
    }
}

impl Serialize for BloscCompressionLevel {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(self.0)
    }
}

impl<'de> Deserialize<'de> for BloscCompressionLevel {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(d)?;
        if let serde_json::Value::Number(clevel) = value
            && let Some(clevel) = clevel.as_u64()
            && clevel <= 9
        {
            #[allow(clippy::cast_possible_truncation)]
            return Ok(Self(clevel as u8));
        }
        Err(serde::de::Error::custom(
            "clevel must be an integer between 0 and 9",
        ))
    }
}

/// The `blosc` shuffle mode.
#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Debug, Display)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum BloscShuffleMode {
    /// No shuffling.
    NoShuffle = 0,
    /// Byte-wise shuffling.
    Shuffle = 1,
    /// Bit-wise shuffling.
    BitShuffle = 2,
}

/// The `blosc` compressor.
///
/// See <https://www.blosc.org/pages/>.
#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Debug, Display)]
#[serde(rename_all = "lowercase")]
pub enum BloscCompressor {
    /// [BloscLZ](https://github.com/Blosc/c-blosc/blob/main/blosc/blosclz.h): blosc default compressor, heavily based on [FastLZ](http://fastlz.org/).
    BloscLZ,
    /// [LZ4](http://fastcompression.blogspot.com/p/lz4.html): a compact, very popular and fast compressor.
    LZ4,
    /// [LZ4HC](http://fastcompression.blogspot.com/p/lz4.html): a tweaked version of LZ4, produces better compression ratios at the expense of speed.
    LZ4HC,
    /// [Snappy](https://code.google.com/p/snappy): a popular compressor used in many places.
    Snappy,
    /// [Zlib](http://www.zlib.net/): a classic; somewhat slower than the previous ones, but achieving better compression ratios.
    Zlib,
    /// [Zstd](http://www.zstd.net/): an extremely well balanced codec; it provides the best compression ratios among the others above, and at reasonably fast speed.
    Zstd,
}

impl BloscCompressor {
    fn as_cstr(self) -> *const u8 {
        match self {
            Self::BloscLZ => BLOSC_BLOSCLZ_COMPNAME.as_ptr(),
            Self::LZ4 => BLOSC_LZ4_COMPNAME.as_ptr(),
            Self::LZ4HC => BLOSC_LZ4HC_COMPNAME.as_ptr(),
            Self::Snappy => BLOSC_SNAPPY_COMPNAME.as_ptr(),
            Self::Zlib => BLOSC_ZLIB_COMPNAME.as_ptr(),
            Self::Zstd => BLOSC_ZSTD_COMPNAME.as_ptr(),
        }
    }
}

/// Configuration parameters for the `blosc` codec.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug, Display)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct BloscCodecConfiguration {
    /// The compressor.
    pub cname: BloscCompressor,
    /// The compression level.
    pub clevel: BloscCompressionLevel,
    /// The shuffle mode.
    #[serde(default = "shuffle_default")]
    pub shuffle: BloscShuffleMode,
    /// The type size in bytes.
    ///
    /// If unset, the item size of the array is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typesize: Option<usize>,
    /// The compression block size in bytes.
    ///
    /// If zero, the block size of the array is used, or blosc chooses one if the array has no block shape.
    #[serde(default)]
    pub blocksize: usize,
}

const fn shuffle_default() -> BloscShuffleMode {
    BloscShuffleMode::Shuffle
}

impl Default for BloscCodecConfiguration {
    fn default() -> Self {
        Self {
            cname: BloscCompressor::LZ4,
            clevel: BloscCompressionLevel(5),
            shuffle: shuffle_default(),
            typesize: None,
            blocksize: 0,
        }
    }
}

fn compressor_as_cstr(compressor: BloscCompressor) -> *const c_char {
    compressor.as_cstr().cast::<c_char>()
}

fn blosc_compress_bytes(
    src: &[u8],
    clevel: BloscCompressionLevel,
    shuffle_mode: BloscShuffleMode,
    typesize: usize,
    compressor: BloscCompressor,
    blocksize: usize,
    numinternalthreads: usize,
) -> Result<Vec<u8>, BloscError> {
    let destsize = src.len() + BLOSC_OVERHEAD;
    let mut dest: Vec<u8> = Vec::with_capacity(destsize);
    let destsize = unsafe {
        blosc_compress_ctx(
            c_int::from(clevel.as_u8()),
            shuffle_mode as c_int,
            typesize.max(1),
            src.len(),
            src.as_ptr().cast::<c_void>(),
            dest.as_mut_ptr().cast::<c_void>(),
            destsize,
            compressor_as_cstr(compressor),
            blocksize,
            c_int::try_from(numinternalthreads.max(1)).unwrap_or(1),
        )
    };
    match usize::try_from(destsize) {
        Ok(destsize) if destsize > 0 => {
            unsafe {
                dest.set_len(destsize);
            }
            dest.shrink_to_fit();
            Ok(dest)
        }
        _ => {
            let clevel = clevel.as_u8();
            Err(BloscError::from(format!(
                "blosc_compress_ctx(clevel: {clevel}, doshuffle: {shuffle_mode:?}, typesize: {typesize}, nbytes: {}, destsize: {destsize}, compressor: {compressor:?}, blocksize: {blocksize}) failed",
                src.len()
            )))
        }
    }
}

/// Validate a blosc compressed buffer and return its decompressed size.
fn blosc_validate(src: &[u8]) -> Option<usize> {
    let mut destsize: usize = 0;
    let valid = unsafe {
        blosc_cbuffer_validate(
            src.as_ptr().cast::<c_void>(),
            src.len(),
            std::ptr::addr_of_mut!(destsize),
        )
    } == 0;
    valid.then_some(destsize)
}

fn blosc_decompress_bytes(
    src: &[u8],
    destsize: usize,
    numinternalthreads: usize,
) -> Result<Vec<u8>, BloscError> {
    let mut dest: Vec<u8> = Vec::with_capacity(destsize);
    let destsize = unsafe {
        blosc_decompress_ctx(
            src.as_ptr().cast::<c_void>(),
            dest.as_mut_ptr().cast::<c_void>(),
            destsize,
            c_int::try_from(numinternalthreads.max(1)).unwrap_or(1),
        )
    };
    if let Ok(destsize) = usize::try_from(destsize) {
        unsafe {
            dest.set_len(destsize);
        }
        Ok(dest)
    } else {
        Err(BloscError::from("blosc_decompress_ctx failed"))
    }
}
