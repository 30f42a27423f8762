use std::collections::BTreeMap;

use arrow::array::types::ByteArrayType;
use arrow::array::{Array, ArrayRef, AsArray, GenericByteArray};
use arrow::datatypes::DataType;

use crate::checkpoint::RowGroupIndex;
use crate::statistics::{BinaryStatisticsBuilder, ColumnStatistics};
use crate::stream::{ByteDataOutputStream, LongOutputStream, PresentOutputStream};
use crate::stripe::{ColumnEncoding, ColumnId, MetadataWriter, StreamDataOutput, StreamKind};

use super::{ColumnWriterOps, WriterConfig, WriterError};

/// Writer for string and binary columns: payload bytes concatenated into a
/// data stream, per-value byte counts in an unsigned length stream.
#[derive(Debug)]
pub struct BinaryColumnWriter {
    column: ColumnId,
    present: PresentOutputStream,
    data: ByteDataOutputStream,
    lengths: LongOutputStream,
    statistics: BinaryStatisticsBuilder,
    rows_in_group: u64,
    history: Vec<ColumnStatistics>,
    closed: bool,
}

impl BinaryColumnWriter {
    pub(crate) fn new(column: ColumnId, config: &WriterConfig) -> Self {
        Self {
            column,
            present: PresentOutputStream::new(config.compression, config.compression_block_size),
            data: ByteDataOutputStream::new(config.compression, config.compression_block_size),
            lengths: LongOutputStream::new(
                config.compression,
                config.compression_block_size,
                false,
            ),
            statistics: BinaryStatisticsBuilder::new(),
            rows_in_group: 0,
            history: Vec::new(),
            closed: false,
        }
    }

    fn write_values<T: ByteArrayType>(
        &mut self,
        values: &GenericByteArray<T>,
    ) -> Result<(), WriterError>
    where
        T::Native: AsRef<[u8]>,
    {
        for row in 0..values.len() {
            if values.is_null(row) {
                self.present.write(false)?;
            } else {
                self.present.write(true)?;
                let value: &[u8] = values.value(row).as_ref();
                self.data.write(value)?;
                self.lengths.write(value.len() as i64)?;
                self.statistics.add(value);
            }
        }
        self.rows_in_group += values.len() as u64;
        Ok(())
    }
}

impl ColumnWriterOps for BinaryColumnWriter {
    fn begin_row_group(&mut self) {
        self.present.record_checkpoint();
        self.data.record_checkpoint();
        self.lengths.record_checkpoint();
    }

    fn write_batch(&mut self, batch: &ArrayRef) -> Result<(), WriterError> {
        assert!(!self.closed, "write to closed column writer");
        assert!(!batch.is_empty(), "empty batch");
        match batch.data_type() {
            DataType::Utf8 => self.write_values(batch.as_string::<i32>()),
            DataType::LargeUtf8 => self.write_values(batch.as_string::<i64>()),
            DataType::Binary => self.write_values(batch.as_binary::<i32>()),
            DataType::LargeBinary => self.write_values(batch.as_binary::<i64>()),
            other => Err(WriterError::ColumnMismatch(format!(
                "expected string or binary values, got {other}"
            ))),
        }
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
        self.data.close()?;
        self.lengths.close()
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
            positions.extend(self.lengths.checkpoints()[group].position_list());
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
        outputs.extend(self.data.take_data_output(self.column, StreamKind::Data));
        outputs.extend(
            self.lengths
                .take_data_output(self.column, StreamKind::Length),
        );
        outputs
    }

    fn buffered_bytes(&self) -> u64 {
        self.present.buffered_bytes() + self.data.buffered_bytes() + self.lengths.buffered_bytes()
    }

    fn retained_bytes(&self) -> u64 {
        std::mem::size_of::<Self>() as u64
            + self.present.retained_bytes()
            + self.data.retained_bytes()
            + self.lengths.retained_bytes()
            + self
                .history
                .iter()
                .map(ColumnStatistics::retained_bytes)
                .sum::<u64>()
    }

    fn reset(&mut self) {
        self.present.reset();
        self.data.reset();
        self.lengths.reset();
        self.statistics = BinaryStatisticsBuilder::new();
        self.rows_in_group = 0;
        self.history.clear();
        self.closed = false;
    }

    fn column_id(&self) -> ColumnId {
        self.column
    }
}
