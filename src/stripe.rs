//! Stream descriptors and stripe-level assembly types.
//!
//! A closed writer tree is drained into an ordered list of
//! [`StreamDataOutput`] records: index streams first, then data streams, in
//! the fixed column-id traversal order the format mandates. The host hands
//! the records, plus the per-column encoding and statistics maps, to a
//! stripe/footer assembler; that assembler is outside this crate.

use serde::{Deserialize, Serialize};

use crate::checkpoint::RowGroupIndex;
use crate::compression::CompressionKind;
use crate::stream::CompressedOutputStream;
use crate::writer::WriterError;

/// Stable identifier of a column: its position in the pre-order flattening
/// of the schema tree, assigned once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnId(pub u32);

impl std::fmt::Display for ColumnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role a stream plays for its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamKind {
    /// Per-row non-null bitmap.
    Present,
    /// Primary value stream.
    Data,
    /// Per-value element counts (lists, maps) or payload lengths (binary).
    Length,
    /// Secondary value stream (timestamp sub-second part).
    Secondary,
    /// Serialized row-group index entries.
    RowIndex,
    /// Serialized bloom filter (reserved; not produced by this crate).
    BloomFilter,
}

/// Descriptor of one finalized stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    /// Owning column.
    pub column: ColumnId,
    /// Role of the stream.
    pub kind: StreamKind,
    /// Length of the finished stream in bytes.
    pub length: u64,
}

/// A finalized stream: descriptor plus framed bytes, produced only after the
/// owning writer closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDataOutput {
    /// Descriptor recorded in the stripe footer.
    pub stream: Stream,
    /// The framed stream bytes.
    pub bytes: Vec<u8>,
}

impl StreamDataOutput {
    /// Wraps finished bytes with their descriptor.
    pub fn new(column: ColumnId, kind: StreamKind, bytes: Vec<u8>) -> Self {
        Self {
            stream: Stream {
                column,
                kind,
                length: bytes.len() as u64,
            },
            bytes,
        }
    }
}

/// How a column's values are laid out in its streams, emitted once per
/// column per stripe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnEncoding {
    /// Values written directly to the data streams.
    Direct,
}

/// Serializes writer metadata (row-group indexes) through the same block
/// compression as the data streams.
#[derive(Debug, Clone, Copy)]
pub struct MetadataWriter {
    compression: CompressionKind,
    block_size: usize,
}

impl MetadataWriter {
    /// Creates a metadata writer for the file's codec.
    pub fn new(compression: CompressionKind, block_size: usize) -> Self {
        Self {
            compression,
            block_size,
        }
    }

    /// Serializes and frames one column's row-group indexes.
    pub fn write_row_indexes(&self, indexes: &[RowGroupIndex]) -> Result<Vec<u8>, WriterError> {
        let serialized = bincode::serialize(indexes)?;
        let mut output = CompressedOutputStream::new(self.compression, self.block_size);
        output.write(&serialized)?;
        output.flush()?;
        Ok(output.take_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::ColumnStatistics;

    #[test]
    fn stream_data_output_records_length() {
        let out = StreamDataOutput::new(ColumnId(3), StreamKind::Length, vec![1, 2, 3, 4]);
        assert_eq!(out.stream.length, 4);
        assert_eq!(out.stream.column, ColumnId(3));
    }

    #[test]
    fn row_indexes_roundtrip_through_serialization() {
        let indexes = vec![
            RowGroupIndex {
                positions: vec![0, 0, 0],
                statistics: ColumnStatistics::of_counts(3, 4),
            },
            RowGroupIndex {
                positions: vec![0, 1, 2],
                statistics: ColumnStatistics::of_counts(4, 4),
            },
        ];
        let writer = MetadataWriter::new(CompressionKind::None, 1024);
        let bytes = writer.write_row_indexes(&indexes).unwrap();
        let decoded: Vec<RowGroupIndex> = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, indexes);
    }

    #[test]
    fn compressed_metadata_is_framed() {
        let indexes = vec![RowGroupIndex {
            positions: vec![0; 64],
            statistics: ColumnStatistics::of_counts(0, 0),
        }];
        let writer = MetadataWriter::new(CompressionKind::Lz4, 256 * 1024);
        let bytes = writer.write_row_indexes(&indexes).unwrap();
        let header = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]);
        let payload_len = (header >> 1) as usize;
        assert_eq!(bytes.len(), 3 + payload_len);
    }
}
