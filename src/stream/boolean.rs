//! Bit-packed boolean stream.

use crate::checkpoint::BooleanStreamCheckpoint;
use crate::compression::CompressionKind;
use crate::stripe::{ColumnId, StreamDataOutput, StreamKind};
use crate::writer::WriterError;

use super::output::CompressedOutputStream;

/// Encodes booleans by packing them MSB-first into bytes of a framed stream.
///
/// The final byte is zero-padded when the stream closes. Checkpoints record
/// the stream position together with the bit offset inside the byte being
/// filled, so a reader can resume mid-byte.
#[derive(Debug)]
pub struct BooleanOutputStream {
    output: CompressedOutputStream,
    current: u8,
    bits_in_current: u8,
    checkpoints: Vec<BooleanStreamCheckpoint>,
    closed: bool,
}

impl BooleanOutputStream {
    /// Creates an empty boolean stream.
    pub fn new(compression: CompressionKind, block_size: usize) -> Self {
        Self {
            output: CompressedOutputStream::new(compression, block_size),
            current: 0,
            bits_in_current: 0,
            checkpoints: Vec::new(),
            closed: false,
        }
    }

    /// Appends one boolean.
    pub fn write(&mut self, value: bool) -> Result<(), WriterError> {
        debug_assert!(!self.closed);
        if value {
            self.current |= 0x80 >> self.bits_in_current;
        }
        self.bits_in_current += 1;
        if self.bits_in_current == 8 {
            self.output.write_byte(self.current)?;
            self.current = 0;
            self.bits_in_current = 0;
        }
        Ok(())
    }

    /// Appends `count` copies of `value`, using whole-byte writes when the
    /// stream is byte-aligned.
    pub fn write_repeated(&mut self, mut count: u64, value: bool) -> Result<(), WriterError> {
        while count > 0 && self.bits_in_current != 0 {
            self.write(value)?;
            count -= 1;
        }
        let fill = if value { 0xffu8 } else { 0x00u8 };
        while count >= 8 {
            self.output.write_byte(fill)?;
            count -= 8;
        }
        while count > 0 {
            self.write(value)?;
            count -= 1;
        }
        Ok(())
    }

    /// Records a checkpoint at the current position.
    pub fn record_checkpoint(&mut self) {
        self.checkpoints.push(BooleanStreamCheckpoint {
            position: self.output.position(),
            bit_offset: self.bits_in_current,
        });
    }

    /// Checkpoints recorded so far, one per row group.
    pub fn checkpoints(&self) -> &[BooleanStreamCheckpoint] {
        &self.checkpoints
    }

    /// Flushes the trailing partial byte and the framing buffer.
    pub fn close(&mut self) -> Result<(), WriterError> {
        if self.bits_in_current > 0 {
            self.output.write_byte(self.current)?;
            self.current = 0;
            self.bits_in_current = 0;
        }
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
            + (self.checkpoints.capacity() * std::mem::size_of::<BooleanStreamCheckpoint>()) as u64
    }

    /// Returns the stream to a pristine state, keeping allocations.
    pub fn reset(&mut self) {
        self.output.reset();
        self.current = 0;
        self.bits_in_current = 0;
        self.checkpoints.clear();
        self.closed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finish(stream: &mut BooleanOutputStream) -> Vec<u8> {
        stream.close().unwrap();
        stream
            .take_data_output(ColumnId(1), StreamKind::Data)
            .map(|out| out.bytes)
            .unwrap_or_default()
    }

    #[test]
    fn bits_pack_msb_first() {
        let mut stream = BooleanOutputStream::new(CompressionKind::None, 64);
        for value in [true, true, false, true] {
            stream.write(value).unwrap();
        }
        assert_eq!(finish(&mut stream), vec![0b1101_0000]);
    }

    #[test]
    fn repeated_writes_cross_byte_boundaries() {
        let mut stream = BooleanOutputStream::new(CompressionKind::None, 64);
        stream.write(false).unwrap();
        stream.write_repeated(18, true).unwrap();
        let bytes = finish(&mut stream);
        assert_eq!(bytes, vec![0b0111_1111, 0xff, 0b1110_0000]);
    }

    #[test]
    fn checkpoint_records_bit_offset() {
        let mut stream = BooleanOutputStream::new(CompressionKind::None, 64);
        stream.record_checkpoint();
        for _ in 0..11 {
            stream.write(true).unwrap();
        }
        stream.record_checkpoint();
        let checkpoints = stream.checkpoints();
        assert_eq!(checkpoints[0].position_list(), vec![0, 0, 0]);
        assert_eq!(checkpoints[1].position_list(), vec![0, 1, 3]);
    }

    #[test]
    fn empty_stream_yields_no_output() {
        let mut stream = BooleanOutputStream::new(CompressionKind::None, 64);
        stream.close().unwrap();
        assert!(stream.take_data_output(ColumnId(1), StreamKind::Data).is_none());
    }
}
