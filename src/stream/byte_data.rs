//! Raw byte stream for variable-length payloads and fixed-width values.

use crate::checkpoint::ByteStreamCheckpoint;
use crate::compression::CompressionKind;
use crate::stripe::{ColumnId, StreamDataOutput, StreamKind};
use crate::writer::WriterError;

use super::output::CompressedOutputStream;

/// Appends value bytes verbatim into a framed stream. Used for binary/string
/// payloads and little-endian floating-point data; any per-value structure
/// (lengths, widths) lives in a sibling stream.
#[derive(Debug)]
pub struct ByteDataOutputStream {
    output: CompressedOutputStream,
    checkpoints: Vec<ByteStreamCheckpoint>,
    closed: bool,
}

impl ByteDataOutputStream {
    /// Creates an empty byte stream.
    pub fn new(compression: CompressionKind, block_size: usize) -> Self {
        Self {
            output: CompressedOutputStream::new(compression, block_size),
            checkpoints: Vec::new(),
            closed: false,
        }
    }

    /// Appends a slice of value bytes.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), WriterError> {
        debug_assert!(!self.closed);
        self.output.write(bytes)
    }

    /// Records a checkpoint at the current position.
    pub fn record_checkpoint(&mut self) {
        self.checkpoints.push(ByteStreamCheckpoint {
            position: self.output.position(),
        });
    }

    /// Checkpoints recorded so far, one per row group.
    pub fn checkpoints(&self) -> &[ByteStreamCheckpoint] {
        &self.checkpoints
    }

    /// Flushes the framing buffer.
    pub fn close(&mut self) -> Result<(), WriterError> {
        self.output.flush()?;
        self.closed = true;
        Ok(())
    }

    /// Extracts the finished stream. Returns `None` for an empty stream.
    pub fn take_data_output(
        &mut self,
        column: ColumnId,
        kind: StreamKind,
    ) -> Option<StreamDataOutput> {
        debug_assert!(self.closed, "stream extracted before close");
        if self.output.finished_len() == 0 {
            return None;
        }
        let bytes = self.output.take_finished();
        Some(StreamDataOutput::new(column, kind, bytes))
    }

    /// Bytes currently buffered.
    pub fn buffered_bytes(&self) -> u64 {
        self.output.buffered_bytes()
    }

    /// Memory retained including spare capacity.
    pub fn retained_bytes(&self) -> u64 {
        self.output.retained_bytes()
            + (self.checkpoints.capacity() * std::mem::size_of::<ByteStreamCheckpoint>()) as u64
    }

    /// Returns the stream to a pristine state, keeping allocations.
    pub fn reset(&mut self) {
        self.output.reset();
        self.checkpoints.clear();
        self.closed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_pass_through_uncompressed() {
        let mut stream = ByteDataOutputStream::new(CompressionKind::None, 64);
        stream.record_checkpoint();
        stream.write(b"abc").unwrap();
        stream.record_checkpoint();
        stream.write(b"defg").unwrap();
        stream.close().unwrap();
        assert_eq!(stream.checkpoints()[0].position_list(), vec![0, 0]);
        assert_eq!(stream.checkpoints()[1].position_list(), vec![0, 3]);
        let out = stream
            .take_data_output(ColumnId(2), StreamKind::Data)
            .unwrap();
        assert_eq!(out.bytes, b"abcdefg");
        assert_eq!(out.stream.length, 7);
    }
}
