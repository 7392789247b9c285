//! Chunk codecs and the frame persistence format for the [`ndchunk`](https://docs.rs/ndchunk) crate.
//!
//! A codec encodes the raw bytes of one chunk of an array into an opaque encoded representation and decodes it back.
//! Codecs are described by a serialisable [`CodecConfiguration`] and instantiated with [`Codec::from_configuration`].
//!
//! The following codecs are available:
//!  - `bytes`: no encoding, see [`BytesCodec`],
//!  - `blosc` (feature `blosc`): c-blosc compression with shuffling, see [`blosc::BloscCodec`],
//!  - `gzip` (feature `gzip`): see [`gzip::GzipCodec`],
//!  - `zstd` (feature `zstd`): see [`zstd::ZstdCodec`].
//!
//! The [`frame`] module implements a serialised representation of a sequence of encoded chunks together with the layout of the array they belong to.
//!
//! ## Licence
//! `ndchunk_codec` is licensed under either of
//!  - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license <http://opensource.org/licenses/MIT>, at your option.

mod options;
pub use options::CodecOptions;

mod bytes_codec;
pub use bytes_codec::BytesCodec;

#[cfg(feature = "blosc")]
pub mod blosc;

#[cfg(feature = "gzip")]
pub mod gzip;

#[cfg(feature = "zstd")]
pub mod zstd;

pub mod frame;

use std::borrow::Cow;
use std::sync::Arc;

use derive_more::{Deref, From};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw bytes passed to and returned from a codec.
///
/// Codecs that do not transform their input (e.g. [`BytesCodec`]) return borrowed bytes unchanged.
pub type RawBytes<'a> = Cow<'a, [u8]>;

/// Traits for a chunk codec.
pub trait CodecTraits: core::fmt::Debug + Send + Sync {
    /// The identifier of the codec, matching the `name` of its [`CodecConfiguration`].
    fn identifier(&self) -> &'static str;

    /// Return the configuration of the codec.
    fn configuration(&self) -> CodecConfiguration;

    /// Returns true if the codec subdivides chunks into blocks of [`CodecOptions::blocksize`] bytes.
    fn supports_blocks(&self) -> bool {
        false
    }

    /// Encode chunk bytes.
    ///
    /// # Errors
    /// Returns [`CodecError`] if a codec fails.
    fn encode<'a>(
        &self,
        decoded_value: RawBytes<'a>,
        options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError>;

    /// Decode chunk bytes.
    ///
    /// `decoded_size` is the expected size of the decoded value in bytes.
    ///
    /// # Errors
    /// Returns [`CodecError`] if a codec fails or the decoded output is not `decoded_size` bytes.
    fn decode<'a>(
        &self,
        encoded_value: RawBytes<'a>,
        decoded_size: usize,
        options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError>;
}

/// A chunk codec.
#[derive(Debug, Clone, Deref, From)]
pub struct Codec(Arc<dyn CodecTraits>);

impl Codec {
    /// Create a codec from a codec implementation.
    pub fn new<T: CodecTraits + 'static>(codec: T) -> Self {
        Self(Arc::new(codec))
    }

    /// Create a codec from its configuration.
    ///
    /// # Errors
    /// Returns [`CodecError`] if the configuration is not supported by the codec.
    pub fn from_configuration(configuration: &CodecConfiguration) -> Result<Self, CodecError> {
        match configuration {
            CodecConfiguration::Bytes => Ok(Self::new(BytesCodec)),
            #[cfg(feature = "blosc")]
            CodecConfiguration::Blosc(configuration) => Ok(Self::new(
                blosc::BloscCodec::new_with_configuration(configuration)?,
            )),
            #[cfg(feature = "gzip")]
            CodecConfiguration::Gzip(configuration) => Ok(Self::new(
                gzip::GzipCodec::new_with_configuration(configuration),
            )),
            #[cfg(feature = "zstd")]
            CodecConfiguration::Zstd(configuration) => Ok(Self::new(
                zstd::ZstdCodec::new_with_configuration(configuration),
            )),
        }
    }
}

/// The configuration of a codec.
///
/// Serialised as a JSON object tagged by the codec `name`, e.g.
/// ```json
/// {
///     "name": "blosc",
///     "cname": "lz4",
///     "clevel": 5,
///     "shuffle": "shuffle",
///     "blocksize": 0
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(tag = "name", rename_all = "lowercase")]
#[non_exhaustive]
pub enum CodecConfiguration {
    /// The `bytes` codec. Chunks are stored without encoding.
    Bytes,
    /// The `blosc` codec.
    #[cfg(feature = "blosc")]
    Blosc(blosc::BloscCodecConfiguration),
    /// The `gzip` codec.
    #[cfg(feature = "gzip")]
    Gzip(gzip::GzipCodecConfiguration),
    /// The `zstd` codec.
    #[cfg(feature = "zstd")]
    Zstd(zstd::ZstdCodecConfiguration),
}

impl core::fmt::Display for CodecConfiguration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", serde_json::to_string(self).unwrap_or_default())
    }
}

impl Default for CodecConfiguration {
    /// The default codec configuration.
    ///
    /// This is `blosc` with the `lz4` compressor, compression level 5, and byte shuffling if the `blosc` feature is enabled.
    /// Otherwise, it is `bytes`.
    fn default() -> Self {
        #[cfg(feature = "blosc")]
        {
            Self::Blosc(blosc::BloscCodecConfiguration::default())
        }
        #[cfg(not(feature = "blosc"))]
        {
            Self::Bytes
        }
    }
}

/// A codec error.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] Arc<std::io::Error>),
    /// The decoded size of a chunk did not match what was expected.
    #[error("the size of a decoded chunk is {got}, expected {expected}")]
    UnexpectedDecodedSize {
        /// The decoded size.
        got: usize,
        /// The expected size.
        expected: usize,
    },
    /// The codec configuration is invalid.
    #[error("invalid {codec} codec configuration: {reason}")]
    InvalidConfiguration {
        /// The codec identifier.
        codec: &'static str,
        /// A description of the problem.
        reason: String,
    },
    /// Other
    #[error("{_0}")]
    Other(String),
}

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        Self::IOError(Arc::new(err))
    }
}

impl From<&str> for CodecError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for CodecError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}
