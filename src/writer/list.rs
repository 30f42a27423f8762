use std::collections::BTreeMap;

use arrow::array::{Array, ArrayRef, AsArray, GenericListArray, OffsetSizeTrait};
use arrow::compute::concat;
use arrow::datatypes::DataType;

use crate::checkpoint::RowGroupIndex;
use crate::statistics::ColumnStatistics;
use crate::stream::{LongOutputStream, PresentOutputStream};
use crate::stripe::{ColumnEncoding, ColumnId, MetadataWriter, StreamDataOutput, StreamKind};

use super::{ColumnWriter, ColumnWriterOps, WriterConfig, WriterError};

/// Writer for list columns: element counts of present rows go into an
/// unsigned length stream, and the surviving element slices are concatenated
/// into one batch for the element writer. Null rows contribute neither a
/// length nor elements.
#[derive(Debug)]
pub struct ListColumnWriter {
    column: ColumnId,
    present: PresentOutputStream,
    lengths: LongOutputStream,
    child: Box<ColumnWriter>,
    non_null_in_group: u64,
    rows_in_group: u64,
    history: Vec<ColumnStatistics>,
    closed: bool,
}

impl ListColumnWriter {
    pub(crate) fn child(&self) -> &ColumnWriter {
        &self.child
    }

    pub(crate) fn new(column: ColumnId, child: ColumnWriter, config: &WriterConfig) -> Self {
        Self {
            column,
            present: PresentOutputStream::new(config.compression, config.compression_block_size),
            lengths: LongOutputStream::new(
                config.compression,
                config.compression_block_size,
                false,
            ),
            child: Box::new(child),
            non_null_in_group: 0,
            rows_in_group: 0,
            history: Vec::new(),
            closed: false,
        }
    }

    fn write_lists<O: OffsetSizeTrait>(
        &mut self,
        values: &GenericListArray<O>,
    ) -> Result<(), WriterError> {
        let offsets = values.value_offsets();
        let elements = values.values();
        let mut surviving: Vec<ArrayRef> = Vec::new();
        for row in 0..values.len() {
            if values.is_null(row) {
                self.present.write(false)?;
                continue;
            }
            self.present.write(true)?;
            self.non_null_in_group += 1;
            let start = offsets[row].as_usize();
            let end = offsets[row + 1].as_usize();
            self.lengths.write((end - start) as i64)?;
            if end > start {
                surviving.push(elements.slice(start, end - start));
            }
        }
        self.rows_in_group += values.len() as u64;
        if !surviving.is_empty() {
            let parts: Vec<&dyn Array> = surviving.iter().map(|slice| slice.as_ref()).collect();
            let batch = concat(&parts)?;
            self.child.write_batch(&batch)?;
        }
        Ok(())
    }
}

impl ColumnWriterOps for ListColumnWriter {
    fn begin_row_group(&mut self) {
        self.present.record_checkpoint();
        self.lengths.record_checkpoint();
        self.child.begin_row_group();
    }

    fn write_batch(&mut self, batch: &ArrayRef) -> Result<(), WriterError> {
        assert!(!self.closed, "write to closed column writer");
        assert!(!batch.is_empty(), "empty batch");
        match batch.data_type() {
            DataType::List(_) => self.write_lists(batch.as_list::<i32>()),
            DataType::LargeList(_) => self.write_lists(batch.as_list::<i64>()),
            other => Err(WriterError::ColumnMismatch(format!(
                "expected list values, got {other}"
            ))),
        }
    }

    fn finish_row_group(&mut self) -> BTreeMap<ColumnId, ColumnStatistics> {
        assert!(!self.closed, "row group finished on closed column writer");
        let statistics = ColumnStatistics::of_counts(self.non_null_in_group, self.rows_in_group);
        self.non_null_in_group = 0;
        self.rows_in_group = 0;
        self.history.push(statistics.clone());
        let mut all = BTreeMap::from([(self.column, statistics)]);
        all.extend(self.child.finish_row_group());
        all
    }

    fn close(&mut self) -> Result<(), WriterError> {
        self.closed = true;
        self.present.close()?;
        self.lengths.close()?;
        self.child.close()
    }

    fn stripe_statistics(&self) -> BTreeMap<ColumnId, ColumnStatistics> {
        assert!(self.closed, "statistics requested before close");
        let mut all = BTreeMap::from([(self.column, ColumnStatistics::merge_all(&self.history))]);
        all.extend(self.child.stripe_statistics());
        all
    }

    fn column_encodings(&self) -> BTreeMap<ColumnId, ColumnEncoding> {
        let mut all = BTreeMap::from([(self.column, ColumnEncoding::Direct)]);
        all.extend(self.child.column_encodings());
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
        streams.extend(self.child.index_streams(metadata)?);
        streams.extend(self.child.bloom_filter_streams(metadata)?);
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
        outputs.extend(self.child.data_streams());
        outputs
    }

    fn buffered_bytes(&self) -> u64 {
        self.present.buffered_bytes() + self.lengths.buffered_bytes() + self.child.buffered_bytes()
    }

    fn retained_bytes(&self) -> u64 {
        std::mem::size_of::<Self>() as u64
            + self.present.retained_bytes()
            + self.lengths.retained_bytes()
            + self.child.retained_bytes()
            + self
                .history
                .iter()
                .map(ColumnStatistics::retained_bytes)
                .sum::<u64>()
    }

    fn reset(&mut self) {
        self.present.reset();
        self.lengths.reset();
        self.child.reset();
        self.non_null_in_group = 0;
        self.rows_in_group = 0;
        self.history.clear();
        self.closed = false;
    }

    fn column_id(&self) -> ColumnId {
        self.column
    }
}
