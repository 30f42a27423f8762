//! Length-prefixed block framing over an in-memory byte sink.

use crate::compression::CompressionKind;
use crate::writer::WriterError;

/// Size in bytes of a block header: 24-bit little-endian value holding
/// `payload_length << 1 | is_original`.
const BLOCK_HEADER_SIZE: usize = 3;

/// Position of a byte within a (possibly compressed) stream.
///
/// `block_offset` is the offset of the current block's header within the
/// finished stream; it is always 0 for uncompressed streams. `offset` is the
/// logical byte offset inside the current block (or the absolute offset when
/// uncompressed). Together they let a reader seek to a block, decompress it,
/// and skip forward to an exact byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamPosition {
    /// Offset of the containing block's header in the finished stream.
    pub block_offset: u64,
    /// Byte offset inside the current block.
    pub offset: u64,
}

impl StreamPosition {
    /// Flattens the position into the integer list stored in a row-group
    /// index. Fixed arity 2; uncompressed streams use a zero block offset.
    pub fn position_list(&self) -> Vec<u64> {
        vec![self.block_offset, self.offset]
    }
}

/// An in-memory byte sink that frames its contents into fixed-size,
/// optionally compressed blocks.
///
/// Blocks that do not shrink under the codec are stored verbatim; the header's
/// low bit records which case applies so the reader never guesses. With
/// `CompressionKind::None` the stream is raw bytes with no framing at all.
#[derive(Debug)]
pub struct CompressedOutputStream {
    compression: CompressionKind,
    block_size: usize,
    /// Fully framed output, ready to be handed to the host.
    finished: Vec<u8>,
    /// Uncompressed bytes of the block currently being filled.
    current: Vec<u8>,
    /// Offset in `finished` where the current block's header will be written.
    block_start: u64,
}

impl CompressedOutputStream {
    /// Creates a stream with the given codec and block size.
    pub fn new(compression: CompressionKind, block_size: usize) -> Self {
        Self {
            compression,
            block_size,
            finished: Vec::new(),
            current: Vec::new(),
            block_start: 0,
        }
    }

    /// Appends bytes, spilling completed blocks through the codec.
    pub fn write(&mut self, mut bytes: &[u8]) -> Result<(), WriterError> {
        if !self.compression.is_compressed() {
            self.finished.extend_from_slice(bytes);
            return Ok(());
        }
        while !bytes.is_empty() {
            let room = self.block_size - self.current.len();
            if bytes.len() < room {
                self.current.extend_from_slice(bytes);
                break;
            }
            let (head, tail) = bytes.split_at(room);
            self.current.extend_from_slice(head);
            self.spill_block()?;
            bytes = tail;
        }
        Ok(())
    }

    /// Appends a single byte.
    pub fn write_byte(&mut self, byte: u8) -> Result<(), WriterError> {
        self.write(&[byte])
    }

    /// Current write position, captured by checkpoints before a row group.
    pub fn position(&self) -> StreamPosition {
        if !self.compression.is_compressed() {
            return StreamPosition {
                block_offset: 0,
                offset: self.finished.len() as u64,
            };
        }
        StreamPosition {
            block_offset: self.block_start,
            offset: self.current.len() as u64,
        }
    }

    /// Flushes the partially filled block, if any. Called when the owning
    /// writer closes; afterwards `finished_len` is the final stream length.
    pub fn flush(&mut self) -> Result<(), WriterError> {
        if !self.current.is_empty() {
            self.spill_block()?;
        }
        Ok(())
    }

    fn spill_block(&mut self) -> Result<(), WriterError> {
        debug_assert!(self.compression.is_compressed());
        let (payload, original) = match self.compression.compress_block(&self.current)? {
            Some(compressed) => (compressed, false),
            None => (std::mem::take(&mut self.current), true),
        };
        let header = (payload.len() as u32) << 1 | u32::from(original);
        debug_assert!(header < 1 << 24, "block payload exceeds header range");
        self.finished.extend_from_slice(&header.to_le_bytes()[..BLOCK_HEADER_SIZE]);
        self.finished.extend_from_slice(&payload);
        self.current.clear();
        self.block_start = self.finished.len() as u64;
        Ok(())
    }

    /// Total length of the framed output written so far.
    pub fn finished_len(&self) -> u64 {
        self.finished.len() as u64
    }

    /// Bytes currently held in memory for this stream.
    pub fn buffered_bytes(&self) -> u64 {
        (self.finished.len() + self.current.len()) as u64
    }

    /// Memory retained by this stream, including unused buffer capacity.
    pub fn retained_bytes(&self) -> u64 {
        (self.finished.capacity() + self.current.capacity()) as u64
    }

    /// Takes the finished bytes out of the stream. Must only be called after
    /// `flush`; the stream is left empty but reusable.
    pub fn take_finished(&mut self) -> Vec<u8> {
        debug_assert!(self.current.is_empty(), "take_finished before flush");
        self.block_start = 0;
        std::mem::take(&mut self.finished)
    }

    /// Returns the stream to a pristine state, retaining buffer capacity.
    pub fn reset(&mut self) {
        self.finished.clear();
        self.current.clear();
        self.block_start = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncompressed_stream_is_raw_bytes() {
        let mut stream = CompressedOutputStream::new(CompressionKind::None, 16);
        stream.write(b"hello").unwrap();
        assert_eq!(stream.position(), StreamPosition { block_offset: 0, offset: 5 });
        stream.flush().unwrap();
        assert_eq!(stream.take_finished(), b"hello");
    }

    #[test]
    fn blocks_are_framed_with_headers() {
        let mut stream = CompressedOutputStream::new(CompressionKind::Lz4, 8);
        stream.write(&[0u8; 20]).unwrap();
        stream.flush().unwrap();
        let bytes = stream.take_finished();
        // Two full blocks plus one partial block, each with a 3-byte header.
        let mut offset = 0;
        let mut blocks = 0;
        while offset < bytes.len() {
            let header = u32::from_le_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                0,
            ]);
            let length = (header >> 1) as usize;
            offset += BLOCK_HEADER_SIZE + length;
            blocks += 1;
        }
        assert_eq!(offset, bytes.len());
        assert_eq!(blocks, 3);
    }

    #[test]
    fn incompressible_block_is_stored_verbatim() {
        let mut stream = CompressedOutputStream::new(CompressionKind::Lz4, 4);
        let input = [1u8, 87, 23, 244];
        stream.write(&input).unwrap();
        stream.flush().unwrap();
        let bytes = stream.take_finished();
        let header = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]);
        assert_eq!(header & 1, 1, "original bit must be set");
        assert_eq!(&bytes[BLOCK_HEADER_SIZE..], &input);
    }

    #[test]
    fn position_tracks_block_boundaries() {
        let mut stream = CompressedOutputStream::new(CompressionKind::Lz4, 4);
        assert_eq!(stream.position(), StreamPosition { block_offset: 0, offset: 0 });
        stream.write(&[0u8; 3]).unwrap();
        assert_eq!(stream.position().offset, 3);
        stream.write(&[0u8; 2]).unwrap();
        // First block spilled; position now points inside the second block.
        let position = stream.position();
        assert!(position.block_offset > 0);
        assert_eq!(position.offset, 1);
    }

    #[test]
    fn reset_retains_nothing_logically() {
        let mut stream = CompressedOutputStream::new(CompressionKind::Lz4, 8);
        stream.write(&[1u8; 10]).unwrap();
        stream.reset();
        assert_eq!(stream.buffered_bytes(), 0);
        assert_eq!(stream.position(), StreamPosition { block_offset: 0, offset: 0 });
    }
}
