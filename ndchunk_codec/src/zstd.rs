//! The `zstd` codec.
//!
//! Applies [Zstandard](https://facebook.github.io/zstd/) compression to each chunk.
//!
//! ### Codec Configuration Example - [`ZstdCodecConfiguration`]:
//! ```rust
//! # let JSON = r#"
//! {
//!     "name": "zstd",
//!     "level": 3,
//!     "checksum": false
//! }
//! # "#;
//! # use ndchunk_codec::CodecConfiguration;
//! # serde_json::from_str::<CodecConfiguration>(JSON).unwrap();
//! ```

use std::borrow::Cow;

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{CodecConfiguration, CodecError, CodecOptions, CodecTraits, RawBytes};

/// The identifier for the `zstd` codec.
pub const IDENTIFIER: &str = "zstd";

/// Configuration parameters for the `zstd` codec.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug, Display)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct ZstdCodecConfiguration {
    /// The compression level.
    pub level: ZstdCompressionLevel,
    /// Whether to store a checksum of each chunk.
    #[serde(default)]
    pub checksum: bool,
}

/// The `zstd` compression level.
///
/// An integer from -7 (fastest) to 22 (most compression).
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display)]
pub struct ZstdCompressionLevel(i32);

impl TryFrom<i32> for ZstdCompressionLevel {
    type Error = i32;
    fn try_from(level: i32) -> Result<Self, Self::Error> {
        if (-7..=22).contains(&level) {
            Ok(Self(level))
        } else {
            Err(level)
        }
    }
}

impl Serialize for ZstdCompressionLevel {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i32(self.0)
    }
}

impl<'de> Deserialize<'de> for ZstdCompressionLevel {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let level = i32::deserialize(d)?;
        Self::try_from(level).map_err(|level| {
            serde::de::Error::custom(format!(
                "compression level {level} must be an integer between -7 and 22"
            ))
        })
    }
}

impl ZstdCompressionLevel {
    /// The underlying integer compression level.
    #[must_use]
    pub const fn as_i32(&self) -> i32 {
        self.0
    }
}

/// A `zstd` codec implementation.
#[derive(Clone, Debug)]
pub struct ZstdCodec {
    compression: ZstdCompressionLevel,
    checksum: bool,
}

impl ZstdCodec {
    /// Create a new `zstd` codec.
    #[must_use]
    pub const fn new(compression: ZstdCompressionLevel, checksum: bool) -> Self {
        Self {
            compression,
            checksum,
        }
    }

    /// Create a new `zstd` codec from configuration.
    #[must_use]
    pub const fn new_with_configuration(configuration: &ZstdCodecConfiguration) -> Self {
        Self::new(configuration.level, configuration.checksum)
    }
}

impl CodecTraits for ZstdCodec {
    fn identifier(&self) -> &'static str {
        IDENTIFIER
    }

    fn configuration(&self) -> CodecConfiguration {
        CodecConfiguration::Zstd(ZstdCodecConfiguration {
            level: self.compression,
            checksum: self.checksum,
        })
    }

    fn encode<'a>(
        &self,
        decoded_value: RawBytes<'a>,
        options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError> {
        let mut compressor = zstd::bulk::Compressor::new(self.compression.as_i32())?;
        compressor.include_checksum(self.checksum)?;
        let n_workers = u32::try_from(options.concurrent_target()).unwrap_or(u32::MAX);
        if n_workers > 1 {
            compressor.multithread(n_workers)?;
        }
        compressor.include_contentsize(true)?;
        Ok(Cow::Owned(compressor.compress(&decoded_value)?))
    }

    fn decode<'a>(
        &self,
        encoded_value: RawBytes<'a>,
        decoded_size: usize,
        _options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError> {
        let decoded = zstd::bulk::decompress(&encoded_value, decoded_size)?;
        if decoded.len() == decoded_size {
            Ok(Cow::Owned(decoded))
        } else {
            Err(CodecError::UnexpectedDecodedSize {
                got: decoded.len(),
                expected: decoded_size,
            })
        }
    }
}
