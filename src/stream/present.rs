//! The present stream: one boolean per row recording non-nullness.
//!
//! Every column writer owns one of these. Columns that never see a null do
//! not emit a present stream at all; the reader infers all-present from its
//! absence. To support that, the stream stays unmaterialized while only
//! `true` is observed, counting rows and remembering where checkpoints fell,
//! and back-fills a real boolean stream the moment the first null arrives.

use crate::checkpoint::BooleanStreamCheckpoint;
use crate::compression::CompressionKind;
use crate::stripe::{ColumnId, StreamDataOutput, StreamKind};
use crate::writer::WriterError;

use super::boolean::BooleanOutputStream;

/// Run-length boolean stream for null tracking, suppressed when no null is
/// ever written.
#[derive(Debug)]
pub struct PresentOutputStream {
    compression: CompressionKind,
    block_size: usize,
    /// Rows recorded while the stream is still unmaterialized (all present).
    buffered_true_count: u64,
    /// Row counts at which checkpoints were requested before materialization.
    checkpoint_marks: Vec<u64>,
    stream: Option<BooleanOutputStream>,
}

impl PresentOutputStream {
    /// Creates an unmaterialized present stream.
    pub fn new(compression: CompressionKind, block_size: usize) -> Self {
        Self {
            compression,
            block_size,
            buffered_true_count: 0,
            checkpoint_marks: Vec::new(),
            stream: None,
        }
    }

    /// Appends one presence flag (`true` = value present, `false` = null).
    pub fn write(&mut self, present: bool) -> Result<(), WriterError> {
        if let Some(stream) = &mut self.stream {
            return stream.write(present);
        }
        if present {
            self.buffered_true_count += 1;
            return Ok(());
        }
        self.materialize()?;
        self.stream
            .as_mut()
            .expect("present stream just materialized")
            .write(false)
    }

    /// Back-fills the boolean stream with everything recorded so far,
    /// replaying checkpoints at the row counts where they were requested.
    fn materialize(&mut self) -> Result<(), WriterError> {
        debug_assert!(self.stream.is_none());
        let mut stream = BooleanOutputStream::new(self.compression, self.block_size);
        let mut written = 0u64;
        for &mark in &self.checkpoint_marks {
            stream.write_repeated(mark - written, true)?;
            written = mark;
            stream.record_checkpoint();
        }
        stream.write_repeated(self.buffered_true_count - written, true)?;
        self.checkpoint_marks.clear();
        self.stream = Some(stream);
        Ok(())
    }

    /// Records a checkpoint at the current position.
    pub fn record_checkpoint(&mut self) {
        match &mut self.stream {
            Some(stream) => stream.record_checkpoint(),
            None => self.checkpoint_marks.push(self.buffered_true_count),
        }
    }

    /// Checkpoints recorded so far, or `None` when the stream is suppressed.
    pub fn checkpoints(&self) -> Option<&[BooleanStreamCheckpoint]> {
        self.stream.as_ref().map(|stream| stream.checkpoints())
    }

    /// Flushes buffered encoder state.
    pub fn close(&mut self) -> Result<(), WriterError> {
        if let Some(stream) = &mut self.stream {
            stream.close()?;
        }
        Ok(())
    }

    /// Extracts the finished present stream; `None` when suppressed.
    pub fn take_data_output(&mut self, column: ColumnId) -> Option<StreamDataOutput> {
        self.stream
            .as_mut()
            .and_then(|stream| stream.take_data_output(column, StreamKind::Present))
    }

    /// Bytes currently buffered.
    pub fn buffered_bytes(&self) -> u64 {
        self.stream.as_ref().map_or(0, |s| s.buffered_bytes())
    }

    /// Memory retained including spare capacity.
    pub fn retained_bytes(&self) -> u64 {
        self.stream.as_ref().map_or(0, |s| s.retained_bytes())
            + (self.checkpoint_marks.capacity() * std::mem::size_of::<u64>()) as u64
    }

    /// Returns the stream to its pristine, unmaterialized state. The inner
    /// boolean stream is dropped; a fresh stripe starts suppressed again.
    pub fn reset(&mut self) {
        self.buffered_true_count = 0;
        self.checkpoint_marks.clear();
        self.stream = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_present_stream_is_suppressed() {
        let mut present = PresentOutputStream::new(CompressionKind::None, 64);
        present.record_checkpoint();
        for _ in 0..100 {
            present.write(true).unwrap();
        }
        present.close().unwrap();
        assert!(present.checkpoints().is_none());
        assert!(present.take_data_output(ColumnId(1)).is_none());
    }

    #[test]
    fn first_null_materializes_with_backfill() {
        let mut present = PresentOutputStream::new(CompressionKind::None, 64);
        present.record_checkpoint();
        for _ in 0..5 {
            present.write(true).unwrap();
        }
        present.write(false).unwrap();
        present.write(true).unwrap();
        present.close().unwrap();
        let output = present.take_data_output(ColumnId(1)).unwrap();
        assert_eq!(output.stream.kind, StreamKind::Present);
        // 7 bits: 1111101, zero-padded to a byte.
        assert_eq!(output.bytes, vec![0b1111_1010]);
    }

    #[test]
    fn checkpoints_replay_at_recorded_rows() {
        let mut present = PresentOutputStream::new(CompressionKind::None, 64);
        present.record_checkpoint();
        for _ in 0..10 {
            present.write(true).unwrap();
        }
        present.record_checkpoint();
        present.write(false).unwrap();
        let checkpoints = present.checkpoints().unwrap();
        assert_eq!(checkpoints.len(), 2);
        assert_eq!(checkpoints[0].position_list(), vec![0, 0, 0]);
        // Ten bits in: one full byte plus two bits.
        assert_eq!(checkpoints[1].position_list(), vec![0, 1, 2]);
    }
}
