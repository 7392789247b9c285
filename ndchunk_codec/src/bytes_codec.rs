use crate::{CodecConfiguration, CodecError, CodecOptions, CodecTraits, RawBytes};

/// The `bytes` codec.
///
/// Chunks are stored as-is.
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesCodec;

impl CodecTraits for BytesCodec {
    fn identifier(&self) -> &'static str {
        "bytes"
    }

    fn configuration(&self) -> CodecConfiguration {
        CodecConfiguration::Bytes
    }

    fn encode<'a>(
        &self,
        decoded_value: RawBytes<'a>,
        _options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError> {
        Ok(decoded_value)
    }

    fn decode<'a>(
        &self,
        encoded_value: RawBytes<'a>,
        decoded_size: usize,
        _options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError> {
        if encoded_value.len() == decoded_size {
            Ok(encoded_value)
        } else {
            Err(CodecError::UnexpectedDecodedSize {
                got: encoded_value.len(),
                expected: decoded_size,
            })
        }
    }
}
