use std::collections::BTreeMap;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::concat;
use arrow::datatypes::DataType;

use crate::checkpoint::RowGroupIndex;
use crate::statistics::ColumnStatistics;
use crate::stream::{LongOutputStream, PresentOutputStream};
use crate::stripe::{ColumnEncoding, ColumnId, MetadataWriter, StreamDataOutput, StreamKind};

use super::{ColumnWriter, ColumnWriterOps, WriterConfig, WriterError};

/// Writer for map columns: entry counts of present rows in an unsigned
/// length stream, key and value slices delegated in lock step to the two
/// child writers. A map behaves like a list whose element is a key/value
/// pair split across two columns.
#[derive(Debug)]
pub struct MapColumnWriter {
    column: ColumnId,
    present: PresentOutputStream,
    lengths: LongOutputStream,
    key_writer: Box<ColumnWriter>,
    value_writer: Box<ColumnWriter>,
    non_null_in_group: u64,
    rows_in_group: u64,
    history: Vec<ColumnStatistics>,
    closed: bool,
}

impl MapColumnWriter {
    pub(crate) fn key_writer(&self) -> &ColumnWriter {
        &self.key_writer
    }

    pub(crate) fn value_writer(&self) -> &ColumnWriter {
        &self.value_writer
    }

    pub(crate) fn new(
        column: ColumnId,
        key_writer: ColumnWriter,
        value_writer: ColumnWriter,
        config: &WriterConfig,
    ) -> Self {
        Self {
            column,
            present: PresentOutputStream::new(config.compression, config.compression_block_size),
            lengths: LongOutputStream::new(
                config.compression,
                config.compression_block_size,
                false,
            ),
            key_writer: Box::new(key_writer),
            value_writer: Box::new(value_writer),
            non_null_in_group: 0,
            rows_in_group: 0,
            history: Vec::new(),
            closed: false,
        }
    }
}

impl ColumnWriterOps for MapColumnWriter {
    fn begin_row_group(&mut self) {
        self.present.record_checkpoint();
        self.lengths.record_checkpoint();
        self.key_writer.begin_row_group();
        self.value_writer.begin_row_group();
    }

    fn write_batch(&mut self, batch: &ArrayRef) -> Result<(), WriterError> {
        assert!(!self.closed, "write to closed column writer");
        assert!(!batch.is_empty(), "empty batch");
        if !matches!(batch.data_type(), DataType::Map(_, _)) {
            return Err(WriterError::ColumnMismatch(format!(
                "expected map values, got {}",
                batch.data_type()
            )));
        }
        let values = batch.as_map();
        let offsets = values.value_offsets();
        let keys = values.keys();
        let entries = values.values();
        let mut surviving_keys: Vec<ArrayRef> = Vec::new();
        let mut surviving_values: Vec<ArrayRef> = Vec::new();
        for row in 0..values.len() {
            if values.is_null(row) {
                self.present.write(false)?;
                continue;
            }
            self.present.write(true)?;
            self.non_null_in_group += 1;
            let start = offsets[row] as usize;
            let end = offsets[row + 1] as usize;
            self.lengths.write((end - start) as i64)?;
            if end > start {
                surviving_keys.push(keys.slice(start, end - start));
                surviving_values.push(entries.slice(start, end - start));
            }
        }
        self.rows_in_group += values.len() as u64;
        if !surviving_keys.is_empty() {
            let parts: Vec<&dyn Array> = surviving_keys.iter().map(|s| s.as_ref()).collect();
            let batch = concat(&parts)?;
            self.key_writer.write_batch(&batch)?;
            let parts: Vec<&dyn Array> = surviving_values.iter().map(|s| s.as_ref()).collect();
            let batch = concat(&parts)?;
            self.value_writer.write_batch(&batch)?;
        }
        Ok(())
    }

    fn finish_row_group(&mut self) -> BTreeMap<ColumnId, ColumnStatistics> {
        assert!(!self.closed, "row group finished on closed column writer");
        let statistics = ColumnStatistics::of_counts(self.non_null_in_group, self.rows_in_group);
        self.non_null_in_group = 0;
        self.rows_in_group = 0;
        self.history.push(statistics.clone());
        let mut all = BTreeMap::from([(self.column, statistics)]);
        all.extend(self.key_writer.finish_row_group());
        all.extend(self.value_writer.finish_row_group());
        all
    }

    fn close(&mut self) -> Result<(), WriterError> {
        self.closed = true;
        self.present.close()?;
        self.lengths.close()?;
        self.key_writer.close()?;
        self.value_writer.close()
    }

    fn stripe_statistics(&self) -> BTreeMap<ColumnId, ColumnStatistics> {
        assert!(self.closed, "statistics requested before close");
        let mut all = BTreeMap::from([(self.column, ColumnStatistics::merge_all(&self.history))]);
        all.extend(self.key_writer.stripe_statistics());
        all.extend(self.value_writer.stripe_statistics());
        all
    }

    fn column_encodings(&self) -> BTreeMap<ColumnId, ColumnEncoding> {
        let mut all = BTreeMap::from([(self.column, ColumnEncoding::Direct)]);
        all.extend(self.key_writer.column_encodings());
        all.extend(self.value_writer.column_encodings());
        all
    }

    fn index_streams(
        &mut self,
        metadata: &MetadataWriter,
    ) -> Result<Vec<StreamDataOutput>, WriterError> {
        assert!(self.closed, "index streams requested before close");
        let mut indexes = Vec::with_capacity(self.history.len());
        for (group, statistics) in self.history.iter().enumerate() {
            let mut positions = Vec::new();
            if let Some(checkpoints) = self.present.checkpoints() {
                positions.extend(checkpoints[group].position_list());
            }
            positions.extend(self.lengths.checkpoints()[group].position_list());
            indexes.push(RowGroupIndex {
                positions,
                statistics: statistics.clone(),
            });
        }
        let bytes = metadata.write_row_indexes(&indexes)?;
        let mut streams = vec![StreamDataOutput::new(
            self.column,
            StreamKind::RowIndex,
            bytes,
        )];
        streams.extend(self.key_writer.index_streams(metadata)?);
        streams.extend(self.value_writer.index_streams(metadata)?);
        streams.extend(self.key_writer.bloom_filter_streams(metadata)?);
        streams.extend(self.value_writer.bloom_filter_streams(metadata)?);
        Ok(streams)
    }

    fn bloom_filter_streams(
        &mut self,
        _metadata: &MetadataWriter,
    ) -> Result<Vec<StreamDataOutput>, WriterError> {
        Ok(Vec::new())
    }

    fn data_streams(&mut self) -> Vec<StreamDataOutput> {
        assert!(self.closed, "data streams requested before close");
        let mut outputs = Vec::new();
        outputs.extend(self.present.take_data_output(self.column));
        outputs.extend(
            self.lengths
                .take_data_output(self.column, StreamKind::Length),
        );
        outputs.extend(self.key_writer.data_streams());
        outputs.extend(self.value_writer.data_streams());
        outputs
    }

    fn buffered_bytes(&self) -> u64 {
        self.present.buffered_bytes()
            + self.lengths.buffered_bytes()
            + self.key_writer.buffered_bytes()
            + self.value_writer.buffered_bytes()
    }

    fn retained_bytes(&self) -> u64 {
        std::mem::size_of::<Self>() as u64
            + self.present.retained_bytes()
            + self.lengths.retained_bytes()
            + self.key_writer.retained_bytes()
            + self.value_writer.retained_bytes()
            + self
                .history
                .iter()
                .map(ColumnStatistics::retained_bytes)
                .sum::<u64>()
    }

    fn reset(&mut self) {
        self.present.reset();
        self.lengths.reset();
        self.key_writer.reset();
        self.value_writer.reset();
        self.non_null_in_group = 0;
        self.rows_in_group = 0;
        self.history.clear();
        self.closed = false;
    }

    fn column_id(&self) -> ColumnId {
        self.column
    }
}
