//! Block compression codecs.
//!
//! The writer compresses its streams in fixed-size blocks so that a reader
//! can seek to a row group without decompressing the whole stream. The codec
//! is chosen once per file and threaded through every stream constructor;
//! there is no ambient/global compression state.

use crate::writer::WriterError;

/// Compression codec applied to stream blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionKind {
    /// No compression; streams are written as plain bytes with no block framing.
    None,
    /// LZ4 block compression (fastest, moderate ratio).
    Lz4,
    /// ZSTD compression with an explicit level (best ratio).
    Zstd(i32),
}

impl Default for CompressionKind {
    fn default() -> Self {
        // ZSTD level 3 is a good balance of speed and compression
        Self::Zstd(3)
    }
}

impl CompressionKind {
    /// Maximum compression (slower write, smallest files)
    pub fn max_compression() -> Self {
        Self::Zstd(19)
    }

    /// Balanced compression (recommended default)
    pub fn balanced() -> Self {
        Self::Zstd(3)
    }

    /// Fast compression (faster write, larger files)
    pub fn fast() -> Self {
        Self::Lz4
    }

    /// Returns true when streams carry block framing headers.
    pub fn is_compressed(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Compresses one block. Returns `None` when the codec did not shrink the
    /// input, in which case the block must be stored verbatim.
    pub(crate) fn compress_block(&self, input: &[u8]) -> Result<Option<Vec<u8>>, WriterError> {
        let compressed = match self {
            Self::None => return Ok(None),
            Self::Lz4 => lz4_flex::block::compress(input),
            Self::Zstd(level) => zstd::bulk::compress(input, *level)?,
        };
        if compressed.len() < input.len() {
            Ok(Some(compressed))
        } else {
            Ok(None)
        }
    }
}
