//! The column-writer tree.
//!
//! One writer per column in the flattened schema, composed the same way the
//! types nest: struct/list/map writers own their child writers outright and
//! keep them in lock step with a shared present stream. Every writer kind
//! satisfies the same contract:
//!
//! 1. `begin_row_group`: checkpoint every owned stream, recurse;
//! 2. `write_batch` (any number of times): presence bits, values,
//!    statistics accumulation;
//! 3. `finish_row_group`: seal the group's statistics into the history;
//! 4. after the last group, `close`, then drain `index_streams` /
//!    `data_streams` / `stripe_statistics` / `column_encodings`;
//! 5. `reset` to start the next stripe reusing buffers.
//!
//! Writers are strictly single-threaded; run one tree per file being
//! written and never share a tree across threads.

mod binary;
mod boolean;
mod config;
mod double;
mod error;
mod list;
mod long;
mod map;
mod struct_writer;
mod timestamp;


pub use binary::BinaryColumnWriter;
pub use boolean::BooleanColumnWriter;
pub use config::WriterConfig;
pub use double::DoubleColumnWriter;
pub use error::WriterError;
pub use list::ListColumnWriter;
pub use long::LongColumnWriter;
pub use map::MapColumnWriter;
pub use struct_writer::StructColumnWriter;
pub use timestamp::TimestampColumnWriter;

use std::collections::BTreeMap;

use arrow::array::ArrayRef;

use crate::schema::ColumnType;
use crate::statistics::ColumnStatistics;
use crate::stripe::{ColumnEncoding, ColumnId, MetadataWriter, StreamDataOutput};

/// The operations every writer variant implements. Kept private so the
/// closed set of variants stays the only public surface.
pub(crate) trait ColumnWriterOps {
    /// Records a checkpoint on every owned stream, then recurses into
    /// children. Must precede the first `write_batch` of each row group.
    fn begin_row_group(&mut self);

    /// Encodes one batch of values. Panics if the writer is closed or the
    /// batch is empty; those are contract violations, not runtime errors.
    fn write_batch(&mut self, batch: &ArrayRef) -> Result<(), WriterError>;

    /// Seals the current row group's statistics into the history and
    /// returns them for this writer and all descendants, keyed by column.
    /// Panics if the writer is closed.
    fn finish_row_group(&mut self) -> BTreeMap<ColumnId, ColumnStatistics>;

    /// Flushes buffered encoder state and marks the writer closed.
    fn close(&mut self) -> Result<(), WriterError>;

    /// Merges the full row-group history for this writer and descendants.
    /// Panics before `close`.
    fn stripe_statistics(&self) -> BTreeMap<ColumnId, ColumnStatistics>;

    /// Column-to-encoding map for this writer and descendants.
    fn column_encodings(&self) -> BTreeMap<ColumnId, ColumnEncoding>;

    /// One row-index stream per writer, depth first, followed by bloom
    /// filter streams. Panics before `close`.
    fn index_streams(
        &mut self,
        metadata: &MetadataWriter,
    ) -> Result<Vec<StreamDataOutput>, WriterError>;

    /// Bloom filter streams for this writer and descendants. This crate
    /// reserves the slot in the stream order but never fills it.
    fn bloom_filter_streams(
        &mut self,
        metadata: &MetadataWriter,
    ) -> Result<Vec<StreamDataOutput>, WriterError>;

    /// Finalized present/data/length/secondary streams, own streams first,
    /// then depth-first children. Panics before `close`.
    fn data_streams(&mut self) -> Vec<StreamDataOutput>;

    /// Bytes buffered in this subtree's streams.
    fn buffered_bytes(&self) -> u64;

    /// Memory retained by this subtree, including the statistics history.
    fn retained_bytes(&self) -> u64;

    /// Returns the subtree to a pristine open state, keeping allocations.
    fn reset(&mut self);

    /// This writer's column id.
    fn column_id(&self) -> ColumnId;
}

/// A writer for one column subtree: the closed set of primitive and
/// composite variants.
#[derive(Debug)]
pub enum ColumnWriter {
    /// Bit-packed boolean column.
    Boolean(BooleanColumnWriter),
    /// Run-length integer column.
    Long(LongColumnWriter),
    /// IEEE 754 double column.
    Double(DoubleColumnWriter),
    /// Binary or string column with data and length streams.
    Binary(BinaryColumnWriter),
    /// Timestamp column with seconds and sub-second streams.
    Timestamp(TimestampColumnWriter),
    /// Struct column delegating to one child per field.
    Struct(StructColumnWriter),
    /// List column with a lengths stream and one element child.
    List(ListColumnWriter),
    /// Map column with a lengths stream and key/value children.
    Map(MapColumnWriter),
}

impl ColumnWriter {
    /// Builds the writer subtree for `column_type`, consuming one column id
    /// per node from `next_id` in pre-order.
    pub fn new(column_type: &ColumnType, next_id: &mut u32, config: &WriterConfig) -> Self {
        let column = ColumnId(*next_id);
        *next_id += 1;
        match column_type {
            ColumnType::Boolean => ColumnWriter::Boolean(BooleanColumnWriter::new(column, config)),
            ColumnType::Long => ColumnWriter::Long(LongColumnWriter::new(column, config)),
            ColumnType::Double => ColumnWriter::Double(DoubleColumnWriter::new(column, config)),
            ColumnType::Binary | ColumnType::String => {
                ColumnWriter::Binary(BinaryColumnWriter::new(column, config))
            }
            ColumnType::Timestamp => {
                ColumnWriter::Timestamp(TimestampColumnWriter::new(column, config))
            }
            ColumnType::Struct(fields) => {
                let children = fields
                    .iter()
                    .map(|field| ColumnWriter::new(&field.column_type, next_id, config))
                    .collect();
                ColumnWriter::Struct(StructColumnWriter::new(column, children, config))
            }
            ColumnType::List(element) => {
                let child = ColumnWriter::new(element, next_id, config);
                ColumnWriter::List(ListColumnWriter::new(column, child, config))
            }
            ColumnType::Map(key, value) => {
                let key_writer = ColumnWriter::new(key, next_id, config);
                let value_writer = ColumnWriter::new(value, next_id, config);
                ColumnWriter::Map(MapColumnWriter::new(column, key_writer, value_writer, config))
            }
        }
    }

    /// Builds one writer per top-level column, assigning ids pre-order
    /// starting at `first_id` (files reserve id 0 for the table root).
    pub fn tree_for_columns(
        columns: &[(String, ColumnType)],
        first_id: u32,
        config: &WriterConfig,
    ) -> Vec<ColumnWriter> {
        let mut next_id = first_id;
        columns
            .iter()
            .map(|(_, column_type)| ColumnWriter::new(column_type, &mut next_id, config))
            .collect()
    }

    fn ops(&self) -> &dyn ColumnWriterOps {
        match self {
            ColumnWriter::Boolean(writer) => writer,
            ColumnWriter::Long(writer) => writer,
            ColumnWriter::Double(writer) => writer,
            ColumnWriter::Binary(writer) => writer,
            ColumnWriter::Timestamp(writer) => writer,
            ColumnWriter::Struct(writer) => writer,
            ColumnWriter::List(writer) => writer,
            ColumnWriter::Map(writer) => writer,
        }
    }

    fn ops_mut(&mut self) -> &mut dyn ColumnWriterOps {
        match self {
            ColumnWriter::Boolean(writer) => writer,
            ColumnWriter::Long(writer) => writer,
            ColumnWriter::Double(writer) => writer,
            ColumnWriter::Binary(writer) => writer,
            ColumnWriter::Timestamp(writer) => writer,
            ColumnWriter::Struct(writer) => writer,
            ColumnWriter::List(writer) => writer,
            ColumnWriter::Map(writer) => writer,
        }
    }

    /// Records a checkpoint on every owned stream, recursing into children.
    /// Must be called before the first `write_batch` of each row group.
    pub fn begin_row_group(&mut self) {
        self.ops_mut().begin_row_group()
    }

    /// Encodes one batch of column values.
    ///
    /// # Panics
    ///
    /// Panics if the writer is closed or the batch is empty; both are
    /// contract violations by the host, not recoverable conditions.
    pub fn write_batch(&mut self, batch: &ArrayRef) -> Result<(), WriterError> {
        self.ops_mut().write_batch(batch)
    }

    /// Seals the current row group and returns its statistics for this
    /// writer and every descendant.
    ///
    /// # Panics
    ///
    /// Panics if the writer is closed.
    pub fn finish_row_group(&mut self) -> BTreeMap<ColumnId, ColumnStatistics> {
        self.ops_mut().finish_row_group()
    }

    /// Flushes buffered encoder state and closes the writer. The writer
    /// must not be written to afterwards.
    pub fn close(&mut self) -> Result<(), WriterError> {
        log::debug!(
            "closing column {} with {} buffered bytes",
            self.column_id(),
            self.buffered_bytes()
        );
        self.ops_mut().close()
    }

    /// Stripe statistics: the merge of the whole row-group history for this
    /// writer and every descendant.
    ///
    /// # Panics
    ///
    /// Panics if called before `close`.
    pub fn stripe_statistics(&self) -> BTreeMap<ColumnId, ColumnStatistics> {
        self.ops().stripe_statistics()
    }

    /// Per-column encoding tags for this writer and every descendant.
    pub fn column_encodings(&self) -> BTreeMap<ColumnId, ColumnEncoding> {
        self.ops().column_encodings()
    }

    /// Serialized row-index streams (one per writer, depth first), followed
    /// by bloom-filter streams.
    ///
    /// # Panics
    ///
    /// Panics if called before `close`.
    pub fn index_streams(
        &mut self,
        metadata: &MetadataWriter,
    ) -> Result<Vec<StreamDataOutput>, WriterError> {
        self.ops_mut().index_streams(metadata)
    }

    /// Bloom-filter streams. Composite writers legitimately return none;
    /// this crate does not build bloom filters for primitives either, but
    /// keeps the slot in the assembly order.
    pub fn bloom_filter_streams(
        &mut self,
        metadata: &MetadataWriter,
    ) -> Result<Vec<StreamDataOutput>, WriterError> {
        self.ops_mut().bloom_filter_streams(metadata)
    }

    /// Finalized data-region streams in format order: own present, data,
    /// length, secondary (zero-byte streams skipped), then each child's
    /// streams depth first.
    ///
    /// # Panics
    ///
    /// Panics if called before `close`.
    pub fn data_streams(&mut self) -> Vec<StreamDataOutput> {
        self.ops_mut().data_streams()
    }

    /// Bytes buffered by this subtree's streams. The host uses this to
    /// decide row-group and stripe boundaries.
    pub fn buffered_bytes(&self) -> u64 {
        self.ops().buffered_bytes()
    }

    /// Memory retained by this subtree, including the row-group statistics
    /// history (which grows across groups even when buffers shrink).
    pub fn retained_bytes(&self) -> u64 {
        self.ops().retained_bytes()
    }

    /// Reopens the writer for the next stripe: clears the statistics
    /// history, counters and streams while keeping allocated capacity.
    /// Legal in any state.
    pub fn reset(&mut self) {
        log::trace!("resetting column {}", self.column_id());
        self.ops_mut().reset()
    }

    /// This writer's column id.
    pub fn column_id(&self) -> ColumnId {
        self.ops().column_id()
    }

    /// Flattens the subtree into pre-order writer references, self first.
    /// Hosts use this to iterate every writer of a file uniformly.
    pub fn nested_writers(&self) -> Vec<&ColumnWriter> {
        let mut writers = Vec::new();
        self.collect_nested(&mut writers);
        writers
    }

    fn collect_nested<'a>(&'a self, out: &mut Vec<&'a ColumnWriter>) {
        out.push(self);
        match self {
            ColumnWriter::Struct(writer) => {
                for child in writer.children() {
                    child.collect_nested(out);
                }
            }
            ColumnWriter::List(writer) => writer.child().collect_nested(out),
            ColumnWriter::Map(writer) => {
                writer.key_writer().collect_nested(out);
                writer.value_writer().collect_nested(out);
            }
            _ => {}
        }
    }
}
