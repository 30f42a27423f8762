//! Per-stream position checkpoints and the row-group index built from them.
//!
//! A checkpoint is captured on every stream a writer owns, once per row
//! group, *before* any data for that group is written. Each stream kind
//! flattens its checkpoint into an integer list of fixed arity; the lists of
//! all streams owned by a writer are concatenated into the positions of one
//! [`RowGroupIndex`] entry. A reader uses the positions to seek directly to
//! the start of a row group.

use serde::{Deserialize, Serialize};

use crate::statistics::ColumnStatistics;
use crate::stream::StreamPosition;

/// Checkpoint for a raw byte stream: just the stream position. Arity 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteStreamCheckpoint {
    /// Position in the underlying framed stream.
    pub position: StreamPosition,
}

impl ByteStreamCheckpoint {
    /// Flattens the checkpoint into `[block_offset, offset]`.
    pub fn position_list(&self) -> Vec<u64> {
        self.position.position_list()
    }
}

/// Checkpoint for a bit-packed boolean stream. Arity 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BooleanStreamCheckpoint {
    /// Position in the underlying framed stream.
    pub position: StreamPosition,
    /// Number of bits already written into the byte being filled (0..=7).
    pub bit_offset: u8,
}

impl BooleanStreamCheckpoint {
    /// Flattens the checkpoint into `[block_offset, offset, bit_offset]`.
    pub fn position_list(&self) -> Vec<u64> {
        let mut positions = self.position.position_list();
        positions.push(u64::from(self.bit_offset));
        positions
    }
}

/// Checkpoint for a run-length-encoded integer stream. Arity 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongStreamCheckpoint {
    /// Position in the underlying framed stream.
    pub position: StreamPosition,
    /// Number of values buffered by the encoder but not yet emitted; a reader
    /// skips this many values after seeking to `position`.
    pub pending_values: u64,
}

impl LongStreamCheckpoint {
    /// Flattens the checkpoint into `[block_offset, offset, pending_values]`.
    pub fn position_list(&self) -> Vec<u64> {
        let mut positions = self.position.position_list();
        positions.push(self.pending_values);
        positions
    }
}

/// One row group's entry in a column's index stream: the concatenated stream
/// positions recorded when the group began, plus the group's statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowGroupIndex {
    /// Flattened checkpoint positions for every stream the writer owns, in
    /// stream order (present first, then data, length, secondary).
    pub positions: Vec<u64>,
    /// Statistics for the rows of this group.
    pub statistics: ColumnStatistics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_list_arities_are_fixed() {
        let position = StreamPosition { block_offset: 5, offset: 9 };
        assert_eq!(ByteStreamCheckpoint { position }.position_list(), vec![5, 9]);
        assert_eq!(
            BooleanStreamCheckpoint { position, bit_offset: 3 }.position_list(),
            vec![5, 9, 3]
        );
        assert_eq!(
            LongStreamCheckpoint { position, pending_values: 17 }.position_list(),
            vec![5, 9, 17]
        );
    }
}
