use std::borrow::Cow;
use std::ffi::c_char;

use blosc_src::blosc_get_complib_info;

use super::{
    BloscCodecConfiguration, BloscCompressionLevel, BloscCompressor, BloscError,
    BloscShuffleMode, IDENTIFIER, blosc_compress_bytes, blosc_decompress_bytes, blosc_validate,
    compressor_as_cstr,
};
use crate::{CodecConfiguration, CodecError, CodecOptions, CodecTraits, RawBytes};

/// A `blosc` codec implementation.
#[derive(Clone, Debug)]
pub struct BloscCodec {
    cname: BloscCompressor,
    clevel: BloscCompressionLevel,
    blocksize: usize,
    shuffle_mode: BloscShuffleMode,
    typesize: Option<usize>,
}

impl BloscCodec {
    /// Create a new `blosc` codec.
    ///
    /// The block size is taken from the [`CodecOptions`] if `blocksize` is none or zero.
    /// The type size is taken from the [`CodecOptions`] if `typesize` is none.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if
    ///  - the compressor is not supported, or
    ///  - `typesize` is zero and shuffling is enabled.
    pub fn new(
        cname: BloscCompressor,
        clevel: BloscCompressionLevel,
        blocksize: Option<usize>,
        shuffle_mode: BloscShuffleMode,
        typesize: Option<usize>,
    ) -> Result<Self, CodecError> {
        if shuffle_mode != BloscShuffleMode::NoShuffle && typesize == Some(0) {
            return Err(CodecError::InvalidConfiguration {
                codec: IDENTIFIER,
                reason: "typesize must be a positive integer if shuffling is enabled".to_string(),
            });
        }

        // Check that the compressor is available
        let support = unsafe {
            blosc_get_complib_info(
                compressor_as_cstr(cname),
                std::ptr::null_mut::<*mut c_char>(),
                std::ptr::null_mut::<*mut c_char>(),
            )
        };
        if support < 0 {
            return Err(CodecError::InvalidConfiguration {
                codec: IDENTIFIER,
                reason: format!("compressor {cname:?} is not supported"),
            });
        }

        Ok(Self {
            cname,
            clevel,
            blocksize: blocksize.unwrap_or_default(),
            shuffle_mode,
            typesize,
        })
    }

    /// Create a new `blosc` codec from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if the configuration is not supported.
    pub fn new_with_configuration(
        configuration: &BloscCodecConfiguration,
    ) -> Result<Self, CodecError> {
        Self::new(
            configuration.cname,
            configuration.clevel,
            Some(configuration.blocksize),
            configuration.shuffle,
            configuration.typesize,
        )
    }
}

impl CodecTraits for BloscCodec {
    fn identifier(&self) -> &'static str {
        IDENTIFIER
    }

    fn configuration(&self) -> CodecConfiguration {
        CodecConfiguration::Blosc(BloscCodecConfiguration {
            cname: self.cname,
            clevel: self.clevel,
            shuffle: self.shuffle_mode,
            typesize: self.typesize,
            blocksize: self.blocksize,
        })
    }

    fn supports_blocks(&self) -> bool {
        true
    }

    fn encode<'a>(
        &self,
        decoded_value: RawBytes<'a>,
        options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError> {
        let typesize = self.typesize.unwrap_or(options.typesize());
        let blocksize = if self.blocksize > 0 {
            self.blocksize
        } else {
            options.blocksize()
        };
        let encoded = blosc_compress_bytes(
            &decoded_value,
            self.clevel,
            self.shuffle_mode,
            typesize,
            self.cname,
            blocksize,
            options.concurrent_target(),
        )
        .map_err(|err: BloscError| CodecError::Other(err.to_string()))?;
        Ok(Cow::Owned(encoded))
    }

    fn decode<'a>(
        &self,
        encoded_value: RawBytes<'a>,
        decoded_size: usize,
        options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError> {
        let Some(destsize) = blosc_validate(&encoded_value) else {
            return Err(CodecError::from("blosc encoded value is invalid"));
        };
        if destsize != decoded_size {
            return Err(CodecError::UnexpectedDecodedSize {
                got: destsize,
                expected: decoded_size,
            });
        }
        let decoded =
            blosc_decompress_bytes(&encoded_value, destsize, options.concurrent_target())
                .map_err(|err| CodecError::Other(err.to_string()))?;
        Ok(Cow::Owned(decoded))
    }
}
