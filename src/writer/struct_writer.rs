use std::collections::BTreeMap;

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray};
use arrow::compute::filter;
use arrow::datatypes::DataType;

use crate::checkpoint::RowGroupIndex;
use crate::statistics::ColumnStatistics;
use crate::stream::PresentOutputStream;
use crate::stripe::{ColumnEncoding, ColumnId, MetadataWriter, StreamDataOutput, StreamKind};

use super::{ColumnWriter, ColumnWriterOps, WriterConfig, WriterError};

/// Writer for struct columns. Carries no data stream of its own: the present
/// stream defines row cardinality and the field writers carry the values.
/// Rows where the struct itself is null are filtered out before delegating,
/// so children only ever see the values of present rows.
#[derive(Debug)]
pub struct StructColumnWriter {
    column: ColumnId,
    present: PresentOutputStream,
    children: Vec<ColumnWriter>,
    non_null_in_group: u64,
    rows_in_group: u64,
    history: Vec<ColumnStatistics>,
    closed: bool,
}

impl StructColumnWriter {
    pub(crate) fn children(&self) -> &[ColumnWriter] {
        &self.children
    }

    pub(crate) fn new(column: ColumnId, children: Vec<ColumnWriter>, config: &WriterConfig) -> Self {
        Self {
            column,
            present: PresentOutputStream::new(config.compression, config.compression_block_size),
            children,
            non_null_in_group: 0,
            rows_in_group: 0,
            history: Vec::new(),
            closed: false,
        }
    }
}

impl ColumnWriterOps for StructColumnWriter {
    fn begin_row_group(&mut self) {
        self.present.record_checkpoint();
        for child in &mut self.children {
            child.begin_row_group();
        }
    }

    fn write_batch(&mut self, batch: &ArrayRef) -> Result<(), WriterError> {
        assert!(!self.closed, "write to closed column writer");
        assert!(!batch.is_empty(), "empty batch");
        if !matches!(batch.data_type(), DataType::Struct(_)) {
            return Err(WriterError::ColumnMismatch(format!(
                "expected struct values, got {}",
                batch.data_type()
            )));
        }
        let values = batch.as_struct();
        if values.num_columns() != self.children.len() {
            return Err(WriterError::ColumnMismatch(format!(
                "struct has {} fields, writer has {}",
                values.num_columns(),
                self.children.len()
            )));
        }
        for row in 0..values.len() {
            self.present.write(!values.is_null(row))?;
        }
        self.rows_in_group += values.len() as u64;
        let non_null = (values.len() - values.null_count()) as u64;
        self.non_null_in_group += non_null;
        if non_null == 0 {
            // Nothing survives suppression; children must not see the batch.
            return Ok(());
        }
        if values.null_count() == 0 {
            for (child, column) in self.children.iter_mut().zip(values.columns()) {
                child.write_batch(column)?;
            }
        } else {
            let validity = values.nulls().expect("null_count > 0 implies a null buffer");
            let mask = BooleanArray::new(validity.inner().clone(), None);
            for (child, column) in self.children.iter_mut().zip(values.columns()) {
                let surviving = filter(column.as_ref(), &mask)?;
                child.write_batch(&surviving)?;
            }
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
        for child in &mut self.children {
            all.extend(child.finish_row_group());
        }
        all
    }

    fn close(&mut self) -> Result<(), WriterError> {
        self.closed = true;
        self.present.close()?;
        for child in &mut self.children {
            child.close()?;
        }
        Ok(())
    }

    fn stripe_statistics(&self) -> BTreeMap<ColumnId, ColumnStatistics> {
        assert!(self.closed, "statistics requested before close");
        let mut all = BTreeMap::from([(self.column, ColumnStatistics::merge_all(&self.history))]);
        for child in &self.children {
            all.extend(child.stripe_statistics());
        }
        all
    }

    fn column_encodings(&self) -> BTreeMap<ColumnId, ColumnEncoding> {
        let mut all = BTreeMap::from([(self.column, ColumnEncoding::Direct)]);
        for child in &self.children {
            all.extend(child.column_encodings());
        }
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
        for child in &mut self.children {
            streams.extend(child.index_streams(metadata)?);
        }
        for child in &mut self.children {
            streams.extend(child.bloom_filter_streams(metadata)?);
        }
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
        for child in &mut self.children {
            outputs.extend(child.data_streams());
        }
        outputs
    }

    fn buffered_bytes(&self) -> u64 {
        self.present.buffered_bytes()
            + self
                .children
                .iter()
                .map(ColumnWriter::buffered_bytes)
                .sum::<u64>()
    }

    fn retained_bytes(&self) -> u64 {
        std::mem::size_of::<Self>() as u64
            + self.present.retained_bytes()
            + self
                .children
                .iter()
                .map(ColumnWriter::retained_bytes)
                .sum::<u64>()
            + self
                .history
                .iter()
                .map(ColumnStatistics::retained_bytes)
                .sum::<u64>()
    }

    fn reset(&mut self) {
        self.present.reset();
        self.non_null_in_group = 0;
        self.rows_in_group = 0;
        self.history.clear();
        self.closed = false;
        for child in &mut self.children {
            child.reset();
        }
    }

    fn column_id(&self) -> ColumnId {
        self.column
    }
}
