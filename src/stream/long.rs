//! Run-length-encoded integer stream.
//!
//! Values are buffered and emitted as either repeat runs or literal groups:
//!
//! - a repeat run is `[count - 3, stride, base]` where `count` covers 3..=130
//!   values, `stride` is a signed byte, and `base` is a varint;
//! - a literal group is `[-count as i8, v0, v1, ...]` with up to 128 varints.
//!
//! Signed streams zigzag values before the LEB128 varint; unsigned streams
//! (lengths) write the raw magnitude.

use crate::checkpoint::LongStreamCheckpoint;
use crate::compression::CompressionKind;
use crate::stripe::{ColumnId, StreamDataOutput, StreamKind};
use crate::writer::WriterError;

use super::output::CompressedOutputStream;

const MIN_REPEAT_SIZE: usize = 3;
const MAX_REPEAT_SIZE: usize = 127 + MIN_REPEAT_SIZE;
const MAX_LITERAL_SIZE: usize = 128;
const MIN_DELTA: i64 = -128;
const MAX_DELTA: i64 = 127;

/// Run-length encoder for 64-bit integers over a framed byte stream.
#[derive(Debug)]
pub struct LongOutputStream {
    signed: bool,
    output: CompressedOutputStream,
    /// Pending values in literal mode; in repeat mode holds only the base.
    literals: Vec<i64>,
    /// Logical count of pending values (run length while in repeat mode).
    num_literals: usize,
    repeat: bool,
    tail_run_length: usize,
    delta: i64,
    checkpoints: Vec<LongStreamCheckpoint>,
    closed: bool,
}

impl LongOutputStream {
    /// Creates a stream. `signed` selects zigzag varint encoding.
    pub fn new(compression: CompressionKind, block_size: usize, signed: bool) -> Self {
        Self {
            signed,
            output: CompressedOutputStream::new(compression, block_size),
            literals: Vec::with_capacity(MAX_LITERAL_SIZE),
            num_literals: 0,
            repeat: false,
            tail_run_length: 0,
            delta: 0,
            checkpoints: Vec::new(),
            closed: false,
        }
    }

    /// Appends one value.
    pub fn write(&mut self, value: i64) -> Result<(), WriterError> {
        debug_assert!(!self.closed);
        if self.num_literals == 0 {
            self.literals.clear();
            self.literals.push(value);
            self.num_literals = 1;
            self.tail_run_length = 1;
            return Ok(());
        }
        if self.repeat {
            let expected = self.literals[0]
                .wrapping_add(self.delta.wrapping_mul(self.num_literals as i64));
            if value == expected {
                self.num_literals += 1;
                if self.num_literals == MAX_REPEAT_SIZE {
                    self.write_values()?;
                }
            } else {
                self.write_values()?;
                self.literals.push(value);
                self.num_literals = 1;
                self.tail_run_length = 1;
            }
            return Ok(());
        }
        let previous = self.literals[self.num_literals - 1];
        if self.tail_run_length == 1 || value != previous.wrapping_add(self.delta) {
            let delta = value.wrapping_sub(previous);
            if (MIN_DELTA..=MAX_DELTA).contains(&delta) {
                self.delta = delta;
                self.tail_run_length = 2;
            } else {
                self.tail_run_length = 1;
            }
        } else {
            self.tail_run_length += 1;
        }
        if self.tail_run_length == MIN_REPEAT_SIZE {
            if self.num_literals + 1 == MIN_REPEAT_SIZE {
                // The whole buffer is the run; switch modes in place.
                self.repeat = true;
                self.num_literals += 1;
                self.literals.truncate(1);
            } else {
                // Flush the literals preceding the run, then seed the run.
                // write_values clears the encoder state, so the detected
                // stride must survive the flush.
                let stride = self.delta;
                let keep = self.num_literals - (MIN_REPEAT_SIZE - 1);
                let base = self.literals[keep];
                self.literals.truncate(keep);
                self.num_literals = keep;
                self.write_values()?;
                self.literals.push(base);
                self.repeat = true;
                self.num_literals = MIN_REPEAT_SIZE;
                self.delta = stride;
            }
        } else {
            self.literals.push(value);
            self.num_literals += 1;
            if self.num_literals == MAX_LITERAL_SIZE {
                self.write_values()?;
            }
        }
        Ok(())
    }

    /// Emits the pending run or literal group.
    fn write_values(&mut self) -> Result<(), WriterError> {
        if self.num_literals == 0 {
            return Ok(());
        }
        if self.repeat {
            self.output
                .write_byte((self.num_literals - MIN_REPEAT_SIZE) as u8)?;
            self.output.write_byte(self.delta as i8 as u8)?;
            self.write_varint(self.literals[0])?;
        } else {
            self.output.write_byte((-(self.num_literals as i64)) as i8 as u8)?;
            for index in 0..self.num_literals {
                self.write_varint(self.literals[index])?;
            }
        }
        self.literals.clear();
        self.num_literals = 0;
        self.repeat = false;
        self.tail_run_length = 0;
        self.delta = 0;
        Ok(())
    }

    fn write_varint(&mut self, value: i64) -> Result<(), WriterError> {
        let mut encoded = if self.signed {
            ((value << 1) ^ (value >> 63)) as u64
        } else {
            value as u64
        };
        loop {
            if encoded < 0x80 {
                self.output.write_byte(encoded as u8)?;
                return Ok(());
            }
            self.output.write_byte((encoded as u8 & 0x7f) | 0x80)?;
            encoded >>= 7;
        }
    }

    /// Records a checkpoint: stream position plus the count of values the
    /// encoder is still holding.
    pub fn record_checkpoint(&mut self) {
        self.checkpoints.push(LongStreamCheckpoint {
            position: self.output.position(),
            pending_values: self.num_literals as u64,
        });
    }

    /// Checkpoints recorded so far, one per row group.
    pub fn checkpoints(&self) -> &[LongStreamCheckpoint] {
        &self.checkpoints
    }

    /// Flushes pending values and the framing buffer.
    pub fn close(&mut self) -> Result<(), WriterError> {
        self.write_values()?;
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
        self.output.buffered_bytes() + (self.num_literals * std::mem::size_of::<i64>()) as u64
    }

    /// Memory retained including spare capacity.
    pub fn retained_bytes(&self) -> u64 {
        self.output.retained_bytes()
            + (self.literals.capacity() * std::mem::size_of::<i64>()) as u64
            + (self.checkpoints.capacity() * std::mem::size_of::<LongStreamCheckpoint>()) as u64
    }

    /// Returns the stream to a pristine state, keeping allocations.
    pub fn reset(&mut self) {
        self.output.reset();
        self.literals.clear();
        self.num_literals = 0;
        self.repeat = false;
        self.tail_run_length = 0;
        self.delta = 0;
        self.checkpoints.clear();
        self.closed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finish(stream: &mut LongOutputStream) -> Vec<u8> {
        stream.close().unwrap();
        stream
            .take_data_output(ColumnId(1), StreamKind::Data)
            .map(|out| out.bytes)
            .unwrap_or_default()
    }

    #[test]
    fn constant_run_encodes_as_three_bytes() {
        let mut stream = LongOutputStream::new(CompressionKind::None, 64, true);
        for _ in 0..100 {
            stream.write(7).unwrap();
        }
        // control = 100 - 3, stride 0, zigzag(7) = 14
        assert_eq!(finish(&mut stream), vec![97, 0, 14]);
    }

    #[test]
    fn ascending_run_uses_stride() {
        let mut stream = LongOutputStream::new(CompressionKind::None, 64, true);
        for value in 1..=5 {
            stream.write(value).unwrap();
        }
        assert_eq!(finish(&mut stream), vec![2, 1, 2]);
    }

    #[test]
    fn irregular_values_fall_back_to_literals() {
        let mut stream = LongOutputStream::new(CompressionKind::None, 64, true);
        for value in [3, 1, 4] {
            stream.write(value).unwrap();
        }
        assert_eq!(finish(&mut stream), vec![253, 6, 2, 8]);
    }

    #[test]
    fn literals_before_a_run_are_flushed_first() {
        let mut stream = LongOutputStream::new(CompressionKind::None, 64, true);
        for value in [9, 2, 10, 10, 10, 10] {
            stream.write(value).unwrap();
        }
        let bytes = finish(&mut stream);
        // Literal group [9, 2] then a run of four 10s.
        assert_eq!(bytes, vec![254, 18, 4, 1, 0, 20]);
    }

    #[test]
    fn stride_survives_literal_flush_before_a_run() {
        let mut stream = LongOutputStream::new(CompressionKind::None, 64, true);
        for value in [9, 2, 10, 11, 12, 13] {
            stream.write(value).unwrap();
        }
        // Literal group [9, 2], then a run of four values with stride 1
        // starting at 10. The stride detected before the literal flush must
        // reach the emitted run header.
        assert_eq!(finish(&mut stream), vec![254, 18, 4, 1, 1, 20]);
    }

    #[test]
    fn unsigned_mode_skips_zigzag() {
        let mut stream = LongOutputStream::new(CompressionKind::None, 64, false);
        stream.write(200).unwrap();
        // Single literal: control -1, LEB128(200) = [0xc8, 0x01]
        assert_eq!(finish(&mut stream), vec![255, 0xc8, 0x01]);
    }

    #[test]
    fn checkpoint_counts_pending_values() {
        let mut stream = LongOutputStream::new(CompressionKind::None, 64, true);
        stream.record_checkpoint();
        stream.write(5).unwrap();
        stream.write(6).unwrap();
        stream.record_checkpoint();
        let checkpoints = stream.checkpoints();
        assert_eq!(checkpoints[0].position_list(), vec![0, 0, 0]);
        assert_eq!(checkpoints[1].position_list(), vec![0, 0, 2]);
    }

    #[test]
    fn long_literal_groups_split_at_capacity() {
        let mut stream = LongOutputStream::new(CompressionKind::None, 1024, true);
        // Alternate so no run forms; 200 values need two literal groups.
        for index in 0..200i64 {
            stream.write(if index % 2 == 0 { index } else { -index }).unwrap();
        }
        let bytes = finish(&mut stream);
        assert_eq!(bytes[0], (-128i8) as u8);
    }
}
