use std::collections::BTreeMap;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::{cast_with_options, CastOptions};
use arrow::datatypes::{DataType, TimeUnit, TimestampNanosecondType};

use crate::checkpoint::RowGroupIndex;
use crate::statistics::{ColumnStatistics, TimestampStatisticsBuilder};
use crate::stream::{LongOutputStream, PresentOutputStream};
use crate::stripe::{ColumnEncoding, ColumnId, MetadataWriter, StreamDataOutput, StreamKind};

use super::{ColumnWriterOps, WriterConfig, WriterError};

const NANOS_PER_SECOND: i64 = 1_000_000_000;
const NANOS_PER_MILLI: i64 = 1_000_000;

/// Writer for timestamp columns. Each value is split into whole seconds
/// (signed, data stream) and the non-negative sub-second nanos (unsigned,
/// secondary stream); statistics track millisecond precision.
#[derive(Debug)]
pub struct TimestampColumnWriter {
    column: ColumnId,
    present: PresentOutputStream,
    seconds: LongOutputStream,
    nanos: LongOutputStream,
    statistics: TimestampStatisticsBuilder,
    rows_in_group: u64,
    history: Vec<ColumnStatistics>,
    closed: bool,
}

impl TimestampColumnWriter {
    pub(crate) fn new(column: ColumnId, config: &WriterConfig) -> Self {
        Self {
            column,
            present: PresentOutputStream::new(config.compression, config.compression_block_size),
            seconds: LongOutputStream::new(
                config.compression,
                config.compression_block_size,
                true,
            ),
            nanos: LongOutputStream::new(
                config.compression,
                config.compression_block_size,
                false,
            ),
            statistics: TimestampStatisticsBuilder::new(),
            rows_in_group: 0,
            history: Vec::new(),
            closed: false,
        }
    }
}

impl ColumnWriterOps for TimestampColumnWriter {
    fn begin_row_group(&mut self) {
        self.present.record_checkpoint();
        self.seconds.record_checkpoint();
        self.nanos.record_checkpoint();
    }

    fn write_batch(&mut self, batch: &ArrayRef) -> Result<(), WriterError> {
        assert!(!self.closed, "write to closed column writer");
        assert!(!batch.is_empty(), "empty batch");
        // safe: false makes out-of-range values an error, not nulls.
        let values = cast_with_options(
            batch.as_ref(),
            &DataType::Timestamp(TimeUnit::Nanosecond, None),
            &CastOptions {
                safe: false,
                ..Default::default()
            },
        )?;
        let values = values.as_primitive::<TimestampNanosecondType>();
        for row in 0..values.len() {
            if values.is_null(row) {
                self.present.write(false)?;
            } else {
                self.present.write(true)?;
                let total_nanos = values.value(row);
                // Euclidean split keeps the sub-second part non-negative for
                // pre-epoch values.
                self.seconds.write(total_nanos.div_euclid(NANOS_PER_SECOND))?;
                self.nanos.write(total_nanos.rem_euclid(NANOS_PER_SECOND))?;
                self.statistics.add(total_nanos.div_euclid(NANOS_PER_MILLI));
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
        self.seconds.close()?;
        self.nanos.close()
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
            positions.extend(self.seconds.checkpoints()[group].position_list());
            positions.extend(self.nanos.checkpoints()[group].position_list());
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
        let mut outputs = Vec::with_capacity(3);
        outputs.extend(self.present.take_data_output(self.column));
        outputs.extend(self.seconds.take_data_output(self.column, StreamKind::Data));
        outputs.extend(
            self.nanos
                .take_data_output(self.column, StreamKind::Secondary),
        );
        outputs
    }

    fn buffered_bytes(&self) -> u64 {
        self.present.buffered_bytes() + self.seconds.buffered_bytes() + self.nanos.buffered_bytes()
    }

    fn retained_bytes(&self) -> u64 {
        std::mem::size_of::<Self>() as u64
            + self.present.retained_bytes()
            + self.seconds.retained_bytes()
            + self.nanos.retained_bytes()
            + self
                .history
                .iter()
                .map(ColumnStatistics::retained_bytes)
                .sum::<u64>()
    }

    fn reset(&mut self) {
        self.present.reset();
        self.seconds.reset();
        self.nanos.reset();
        self.statistics = TimestampStatisticsBuilder::new();
        self.rows_in_group = 0;
        self.history.clear();
        self.closed = false;
    }

    fn column_id(&self) -> ColumnId {
        self.column
    }
}
