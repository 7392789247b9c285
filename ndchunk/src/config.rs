//! `ndchunk` global configuration options.
//!
//! The global configuration provides the defaults of a [`ContextConfig`](crate::context::ContextConfig).
//! Changing it does not affect contexts that have already been created.

use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ndchunk_codec::CodecConfiguration;

/// Global configuration options for the `ndchunk` crate.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
///
/// ## Codec Concurrent Target
/// > default: [`rayon::current_num_threads()`]
///
/// The default number of concurrent operations a context targets when encoding or decoding chunks.
/// Chunks are encoded and decoded in parallel, and codecs with internal parallelism (e.g. `blosc` and `zstd`) receive a share of the target.
///
/// ## Chunk Concurrent Minimum
/// > default: `4`
///
/// The preferred minimum number of chunks processed concurrently.
/// If fewer chunks than this are processed at once, the remainder of the concurrent target is given to the codec.
///
/// ## Default Codec
/// > default: [`CodecConfiguration::default()`]
///
/// The codec of a context unless one is set explicitly.
#[derive(Debug)]
pub struct Config {
    codec_concurrent_target: usize,
    chunk_concurrent_minimum: usize,
    default_codec: CodecConfiguration,
}

#[allow(clippy::derivable_impls)]
impl Default for Config {
    fn default() -> Self {
        Self {
            codec_concurrent_target: rayon::current_num_threads(),
            chunk_concurrent_minimum: 4,
            default_codec: CodecConfiguration::default(),
        }
    }
}

impl Config {
    /// Get the [codec concurrent target](#codec-concurrent-target) configuration.
    #[must_use]
    pub fn codec_concurrent_target(&self) -> usize {
        self.codec_concurrent_target
    }

    /// Set the [codec concurrent target](#codec-concurrent-target) configuration.
    pub fn set_codec_concurrent_target(&mut self, concurrent_target: usize) -> &mut Self {
        self.codec_concurrent_target = concurrent_target;
        self
    }

    /// Get the [chunk concurrent minimum](#chunk-concurrent-minimum) configuration.
    #[must_use]
    pub fn chunk_concurrent_minimum(&self) -> usize {
        self.chunk_concurrent_minimum
    }

    /// Set the [chunk concurrent minimum](#chunk-concurrent-minimum) configuration.
    pub fn set_chunk_concurrent_minimum(&mut self, concurrent_minimum: usize) -> &mut Self {
        self.chunk_concurrent_minimum = concurrent_minimum;
        self
    }

    /// Get the [default codec](#default-codec) configuration.
    #[must_use]
    pub fn default_codec(&self) -> &CodecConfiguration {
        &self.default_codec
    }

    /// Set the [default codec](#default-codec) configuration.
    pub fn set_default_codec(&mut self, default_codec: CodecConfiguration) -> &mut Self {
        self.default_codec = default_codec;
        self
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Returns a reference to the global `ndchunk` configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .read()
        .unwrap()
}

/// Returns a mutable reference to the global `ndchunk` configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .write()
        .unwrap()
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn config_chunk_concurrent_minimum() {
        assert_eq!(global_config().chunk_concurrent_minimum(), 4);
        global_config_mut().set_chunk_concurrent_minimum(2);
        assert_eq!(global_config().chunk_concurrent_minimum(), 2);
        global_config_mut().set_chunk_concurrent_minimum(4);
    }

    #[test]
    #[serial]
    fn config_default_codec() {
        let default_codec = global_config().default_codec().clone();
        assert_eq!(default_codec, CodecConfiguration::default());
        global_config_mut().set_default_codec(CodecConfiguration::Bytes);
        assert_eq!(global_config().default_codec(), &CodecConfiguration::Bytes);
        global_config_mut().set_default_codec(default_codec);
    }
}
