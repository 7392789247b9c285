//! Contexts.
//!
//! A [`Context`] bundles the configuration shared by the arrays created through it: the [`BufferAllocator`] backing array buffers, the codec encoding chunks, and the concurrent target of chunk encoding and decoding.
//!
//! Contexts are reference counted.
//! Every [`Array`](crate::array::Array) holds an [`Arc<Context>`], so a context lives for as long as any array created through it.

use std::sync::Arc;

use ndchunk_codec::{Codec, CodecConfiguration, CodecError, CodecOptions};
use thiserror::Error;

use crate::config::global_config;

/// Traits for a buffer allocator.
///
/// A buffer allocator provides the flat buffers of plain buffer arrays and the scratch buffers used when encoding chunks.
pub trait BufferAllocator: core::fmt::Debug + Send + Sync {
    /// Allocate a zero-initialised buffer of `len` bytes.
    ///
    /// Returns [`None`] if the allocation fails.
    fn allocate(&self, len: usize) -> Option<Vec<u8>>;

    /// Release a buffer previously returned by [`allocate`](BufferAllocator::allocate).
    fn release(&self, buffer: Vec<u8>);
}

/// The default buffer allocator, backed by the global allocator.
///
/// Allocation failure is reported rather than aborting the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAllocator;

impl BufferAllocator for DefaultAllocator {
    fn allocate(&self, len: usize) -> Option<Vec<u8>> {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(len).ok()?;
        buffer.resize(len, 0);
        Some(buffer)
    }

    fn release(&self, buffer: Vec<u8>) {
        drop(buffer);
    }
}

/// A context creation error.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum ContextError {
    /// The codec could not be created from its configuration.
    #[error(transparent)]
    CodecError(#[from] CodecError),
    /// The allocator failed.
    #[error("the allocator failed to allocate the context")]
    AllocationFailed,
}

/// The configuration of a [`Context`].
#[derive(Clone, Debug)]
pub struct ContextConfig {
    allocator: Arc<dyn BufferAllocator>,
    codec: CodecConfiguration,
    concurrent_target: usize,
}

impl Default for ContextConfig {
    /// Create a context configuration with the [`DefaultAllocator`] and the defaults of the [global configuration](crate::config::Config).
    fn default() -> Self {
        let config = global_config();
        Self {
            allocator: Arc::new(DefaultAllocator),
            codec: config.default_codec().clone(),
            concurrent_target: config.codec_concurrent_target(),
        }
    }
}

impl ContextConfig {
    /// Return the allocator.
    #[must_use]
    pub fn allocator(&self) -> &Arc<dyn BufferAllocator> {
        &self.allocator
    }

    /// Set the allocator.
    #[must_use]
    pub fn with_allocator(mut self, allocator: Arc<dyn BufferAllocator>) -> Self {
        self.allocator = allocator;
        self
    }

    /// Return the codec configuration.
    #[must_use]
    pub fn codec(&self) -> &CodecConfiguration {
        &self.codec
    }

    /// Set the codec configuration.
    #[must_use]
    pub fn with_codec(mut self, codec: CodecConfiguration) -> Self {
        self.codec = codec;
        self
    }

    /// Return the concurrent target.
    #[must_use]
    pub fn concurrent_target(&self) -> usize {
        self.concurrent_target
    }

    /// Set the concurrent target.
    ///
    /// A concurrent target of zero is treated as one.
    #[must_use]
    pub fn with_concurrent_target(mut self, concurrent_target: usize) -> Self {
        self.concurrent_target = concurrent_target;
        self
    }
}

/// A context shared by arrays.
#[derive(Debug)]
pub struct Context {
    config: ContextConfig,
    codec: Codec,
}

impl Context {
    /// Create a new context.
    ///
    /// The context keeps its own copy of `config`.
    ///
    /// # Errors
    /// Returns [`ContextError`] if the codec cannot be created from its configuration or the allocator fails.
    pub fn new(config: ContextConfig) -> Result<Arc<Self>, ContextError> {
        let codec = Codec::from_configuration(config.codec())?;
        let buffer = config
            .allocator
            .allocate(0)
            .ok_or(ContextError::AllocationFailed)?;
        config.allocator.release(buffer);
        log::debug!(
            "created context with codec {} and concurrent target {}",
            config.codec(),
            config.concurrent_target()
        );
        Ok(Arc::new(Self { config, codec }))
    }

    /// Return the configuration of the context.
    #[must_use]
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Return the codec of the context.
    #[must_use]
    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Return the allocator of the context.
    #[must_use]
    pub fn allocator(&self) -> &dyn BufferAllocator {
        self.config.allocator.as_ref()
    }

    /// Return the concurrent target of the context.
    #[must_use]
    pub fn concurrent_target(&self) -> usize {
        self.config.concurrent_target.max(1)
    }

    /// Return the number of chunks to process concurrently and the codec options for each chunk.
    ///
    /// The concurrent target is divided between chunks and the codec, preferring at least the [chunk concurrent minimum](crate::config::Config::chunk_concurrent_minimum) concurrent chunks.
    pub(crate) fn chunk_concurrency(
        &self,
        num_chunks: usize,
        itemsize: usize,
        blocksize: usize,
    ) -> (usize, CodecOptions) {
        let concurrent_target = self.concurrent_target();
        let chunk_concurrent_minimum = global_config().chunk_concurrent_minimum().max(1);
        let chunk_concurrency = num_chunks
            .min(concurrent_target.max(chunk_concurrent_minimum))
            .max(1);
        let codec_concurrency = (concurrent_target / chunk_concurrency).max(1);
        let options = CodecOptions::default()
            .with_typesize(itemsize)
            .with_blocksize(blocksize)
            .with_concurrent_target(codec_concurrency);
        (chunk_concurrency, options)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Debug, Default)]
    struct CountingAllocator {
        live: AtomicUsize,
    }

    impl BufferAllocator for CountingAllocator {
        fn allocate(&self, len: usize) -> Option<Vec<u8>> {
            self.live.fetch_add(1, Ordering::SeqCst);
            Some(vec![0; len])
        }

        fn release(&self, _buffer: Vec<u8>) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn context_new() {
        let allocator = Arc::new(CountingAllocator::default());
        let context = Context::new(
            ContextConfig::default()
                .with_allocator(allocator.clone())
                .with_codec(CodecConfiguration::Bytes)
                .with_concurrent_target(0),
        )
        .unwrap();
        assert_eq!(context.codec().identifier(), "bytes");
        assert_eq!(context.concurrent_target(), 1);
        assert_eq!(allocator.live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn context_array_buffers_released() {
        use crate::array::{Array, ArrayParams, ChunkedStorage, Storage};

        let allocator = Arc::new(CountingAllocator::default());
        let context = Context::new(
            ContextConfig::default()
                .with_allocator(allocator.clone())
                .with_codec(CodecConfiguration::Bytes),
        )
        .unwrap();
        let params = ArrayParams::new(1, [4, 4]);
        let plain = Array::from_buffer(&context, &params, &Storage::PlainBuffer, &[1; 16]).unwrap();
        assert_eq!(allocator.live.load(Ordering::SeqCst), 1);
        let chunked = Array::from_buffer(
            &context,
            &params,
            &ChunkedStorage::new([2, 2], [2, 2]).into(),
            &[1; 16],
        )
        .unwrap();
        assert_eq!(allocator.live.load(Ordering::SeqCst), 1);
        drop(plain);
        assert_eq!(allocator.live.load(Ordering::SeqCst), 0);
        drop(context);
        assert_eq!(chunked.to_vec().unwrap(), vec![1; 16]);
    }

    #[test]
    fn context_allocator_failure() {
        #[derive(Debug)]
        struct FailingAllocator;
        impl BufferAllocator for FailingAllocator {
            fn allocate(&self, _len: usize) -> Option<Vec<u8>> {
                None
            }
            fn release(&self, _buffer: Vec<u8>) {}
        }
        assert!(matches!(
            Context::new(ContextConfig::default().with_allocator(Arc::new(FailingAllocator))),
            Err(ContextError::AllocationFailed)
        ));
    }

    #[test]
    fn default_allocator() {
        let buffer = DefaultAllocator.allocate(16).unwrap();
        assert_eq!(buffer, vec![0; 16]);
        DefaultAllocator.release(buffer);
        assert!(DefaultAllocator.allocate(usize::MAX).is_none());
    }

    #[test]
    fn context_chunk_concurrency() {
        let context = Context::new(
            ContextConfig::default()
                .with_codec(CodecConfiguration::Bytes)
                .with_concurrent_target(8),
        )
        .unwrap();
        let (chunk_concurrency, options) = context.chunk_concurrency(1, 4, 64);
        assert_eq!(chunk_concurrency, 1);
        assert_eq!(options.concurrent_target(), 8);
        assert_eq!(options.typesize(), 4);
        assert_eq!(options.blocksize(), 64);
        let (chunk_concurrency, options) = context.chunk_concurrency(100, 4, 64);
        assert_eq!(chunk_concurrency, 8);
        assert_eq!(options.concurrent_target(), 1);
    }
}
