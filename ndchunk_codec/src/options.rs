//! Codec options for encoding and decoding.

/// Codec options for encoding/decoding.
///
/// The default values are:
/// - `typesize`: `1`
/// - `blocksize`: `0` (chosen by the codec)
/// - `concurrent_target`: number of threads available to Rayon
#[derive(Debug, Clone, Copy)]
pub struct CodecOptions {
    typesize: usize,
    blocksize: usize,
    concurrent_target: usize,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            typesize: 1,
            blocksize: 0,
            concurrent_target: rayon::current_num_threads(),
        }
    }
}

impl CodecOptions {
    /// Return the type size.
    ///
    /// This is the size in bytes of one element of the chunk being encoded.
    #[must_use]
    pub fn typesize(&self) -> usize {
        self.typesize
    }

    /// Set the type size.
    pub fn set_typesize(&mut self, typesize: usize) -> &mut Self {
        self.typesize = typesize;
        self
    }

    /// Set the type size.
    #[must_use]
    pub fn with_typesize(mut self, typesize: usize) -> Self {
        self.typesize = typesize;
        self
    }

    /// Return the block size.
    ///
    /// This is the size in bytes of one block of a chunk.
    /// Codecs that [support blocks](crate::CodecTraits::supports_blocks) compress each block independently.
    /// A block size of zero lets the codec choose.
    #[must_use]
    pub fn blocksize(&self) -> usize {
        self.blocksize
    }

    /// Set the block size.
    pub fn set_blocksize(&mut self, blocksize: usize) -> &mut Self {
        self.blocksize = blocksize;
        self
    }

    /// Set the block size.
    #[must_use]
    pub fn with_blocksize(mut self, blocksize: usize) -> Self {
        self.blocksize = blocksize;
        self
    }

    /// Return the concurrent target.
    ///
    /// Codecs with internal parallelism use up to this many threads.
    #[must_use]
    pub fn concurrent_target(&self) -> usize {
        self.concurrent_target
    }

    /// Set the concurrent target.
    pub fn set_concurrent_target(&mut self, concurrent_target: usize) -> &mut Self {
        self.concurrent_target = concurrent_target;
        self
    }

    /// Set the concurrent target.
    #[must_use]
    pub fn with_concurrent_target(mut self, concurrent_target: usize) -> Self {
        self.concurrent_target = concurrent_target;
        self
    }
}
