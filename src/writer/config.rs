use crate::compression::CompressionKind;

/// Configuration for a writer tree.
///
/// Built once per file and passed by value into every writer and stream
/// constructor; compression is never ambient state.
#[derive(Debug, Clone, Copy)]
pub struct WriterConfig {
    /// Block codec shared by every stream in the file.
    pub compression: CompressionKind,

    /// Uncompressed block size in bytes. Smaller blocks improve random
    /// access granularity, larger blocks improve compression ratio.
    pub compression_block_size: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            compression: CompressionKind::default(),
            // 256 KiB blocks balance seek granularity and ratio
            compression_block_size: 256 * 1024,
        }
    }
}

impl WriterConfig {
    /// Configuration optimized for maximum compression (slower write)
    pub fn max_compression() -> Self {
        Self {
            compression: CompressionKind::max_compression(),
            compression_block_size: 1024 * 1024,
        }
    }

    /// Configuration optimized for fast writing (larger files)
    pub fn fast_write() -> Self {
        Self {
            compression: CompressionKind::fast(),
            compression_block_size: 128 * 1024,
        }
    }

    /// Uncompressed streams, mainly useful for debugging and tests
    pub fn uncompressed() -> Self {
        Self {
            compression: CompressionKind::None,
            compression_block_size: 256 * 1024,
        }
    }
}
