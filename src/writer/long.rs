use std::collections::BTreeMap;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Int64Type};

use crate::checkpoint::RowGroupIndex;
use crate::statistics::{ColumnStatistics, IntegerStatisticsBuilder};
use crate::stream::{LongOutputStream, PresentOutputStream};
use crate::stripe::{ColumnEncoding, ColumnId, MetadataWriter, StreamDataOutput, StreamKind};

use super::{ColumnWriterOps, WriterConfig, WriterError};

/// Writer for integer columns of any width. Inputs are widened to 64 bits
/// and run-length encoded as signed varints.
#[derive(Debug)]
pub struct LongColumnWriter {
    column: ColumnId,
    present: PresentOutputStream,
    data: LongOutputStream,
    statistics: IntegerStatisticsBuilder,
    rows_in_group: u64,
    history: Vec<ColumnStatistics>,
    closed: bool,
}

impl LongColumnWriter {
    pub(crate) fn new(column: ColumnId, config: &WriterConfig) -> Self {
        Self {
            column,
            present: PresentOutputStream::new(config.compression, config.compression_block_size),
            data: LongOutputStream::new(config.compression, config.compression_block_size, true),
            statistics: IntegerStatisticsBuilder::new(),
            rows_in_group: 0,
            history: Vec::new(),
            closed: false,
        }
    }
}

impl ColumnWriterOps for LongColumnWriter {
    fn begin_row_group(&mut self) {
        self.present.record_checkpoint();
        self.data.record_checkpoint();
    }

    fn write_batch(&mut self, batch: &ArrayRef) -> Result<(), WriterError> {
        assert!(!self.closed, "write to closed column writer");
        assert!(!batch.is_empty(), "empty batch");
        let values = cast(batch.as_ref(), &DataType::Int64)?;
        let values = values.as_primitive::<Int64Type>();
        for row in 0..values.len() {
            if values.is_null(row) {
                self.present.write(false)?;
            } else {
                self.present.write(true)?;
                let value = values.value(row);
                self.data.write(value)?;
                self.statistics.add(value);
            }
        }
        self.rows_in_group += values.len() as u64;
        Ok(())
    }

    fn finish_row_group(&mut self) -> BTreeMap<ColumnId, ColumnStatistics> {
        assert!(!self.closed, "row group finished on closed column writer");
        let statistics = self.statistics.finish(self.rows_in_group);
        self.rows_in_group = 0;
        self.history.push(statistics.clone());
        BTreeMap::from([(self.column, statistics)])
    }

    fn close(&mut self) -> Result<(), WriterError> {
        self.closed = true;
        self.present.close()?;
        self.data.close()
    }

    fn stripe_statistics(&self) -> BTreeMap<ColumnId, ColumnStatistics> {
        assert!(self.closed, "statistics requested before close");
        BTreeMap::from([(self.column, ColumnStatistics::merge_all(&self.history))])
    }

    fn column_encodings(&self) -> BTreeMap<ColumnId, ColumnEncoding> {
        BTreeMap::from([(self.column, ColumnEncoding::Direct)])
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
            positions.extend(self.data.checkpoints()[group].position_list());
            indexes.push(RowGroupIndex {
                positions,
                statistics: statistics.clone(),
            });
        }
        let bytes = metadata.write_row_indexes(&indexes)?;
        Ok(vec![StreamDataOutput::new(
            self.column,
            StreamKind::RowIndex,
            bytes,
        )])
    }

    fn bloom_filter_streams(
        &mut self,
        _metadata: &MetadataWriter,
    ) -> Result<Vec<StreamDataOutput>, WriterError> {
        Ok(Vec::new())
    }

    fn data_streams(&mut self) -> Vec<StreamDataOutput> {
        assert!(self.closed, "data streams requested before close");
        let mut outputs = Vec::with_capacity(2);
        outputs.extend(self.present.take_data_output(self.column));
        outputs.extend(self.data.take_data_output(self.column, StreamKind::Data));
        outputs
    }

    fn buffered_bytes(&self) -> u64 {
        self.present.buffered_bytes() + self.data.buffered_bytes()
    }

    fn retained_bytes(&self) -> u64 {
        std::mem::size_of::<Self>() as u64
            + self.present.retained_bytes()
            + self.data.retained_bytes()
            + self
                .history
                .iter()
                .map(ColumnStatistics::retained_bytes)
                .sum::<u64>()
    }

    fn reset(&mut self) {
        self.present.reset();
        self.data.reset();
        self.statistics = IntegerStatisticsBuilder::new();
        self.rows_in_group = 0;
        self.history.clear();
        self.closed = false;
    }

    fn column_id(&self) -> ColumnId {
        self.column
    }
}
