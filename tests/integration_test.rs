//! End-to-end test of the writer lifecycle: several row groups over a nested
//! schema, then stream extraction in footer order and a reset replay.

use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array, StructArray};
use arrow::buffer::NullBuffer;
use arrow::datatypes::{DataType, Field, Fields};

use colstripe::checkpoint::RowGroupIndex;
use colstripe::prelude::*;

fn person_type() -> ColumnType {
    ColumnType::Struct(vec![
        StructField {
            name: "id".into(),
            column_type: ColumnType::Long,
        },
        StructField {
            name: "score".into(),
            column_type: ColumnType::Long,
        },
    ])
}

fn person_fields() -> Fields {
    Fields::from(vec![
        Field::new("id", DataType::Int64, true),
        Field::new("score", DataType::Int64, true),
    ])
}

fn person_batch(
    ids: Vec<Option<i64>>,
    scores: Vec<Option<i64>>,
    validity: Option<Vec<bool>>,
) -> ArrayRef {
    let children: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(ids)),
        Arc::new(Int64Array::from(scores)),
    ];
    let nulls = validity.map(NullBuffer::from);
    Arc::new(StructArray::new(person_fields(), children, nulls))
}

#[test]
fn struct_lifecycle_over_two_row_groups() {
    let config = WriterConfig::uncompressed();
    let mut writer = ColumnWriter::new(&person_type(), &mut 1, &config);

    // Group one: three rows, the middle struct is null.
    writer.begin_row_group();
    writer
        .write_batch(&person_batch(
            vec![Some(1), Some(0), Some(3)],
            vec![Some(10), Some(0), Some(30)],
            Some(vec![true, false, true]),
        ))
        .unwrap();
    let group_one = writer.finish_row_group();
    assert_eq!(group_one[&ColumnId(1)].total_count, 3);
    assert_eq!(group_one[&ColumnId(1)].non_null_count, 2);
    assert_eq!(group_one[&ColumnId(2)].total_count, 2);
    assert_eq!(group_one[&ColumnId(3)].total_count, 2);

    // Group two: three rows, all present.
    writer.begin_row_group();
    writer
        .write_batch(&person_batch(
            vec![Some(4), Some(5), Some(6)],
            vec![Some(40), Some(50), Some(60)],
            None,
        ))
        .unwrap();
    let group_two = writer.finish_row_group();
    assert_eq!(group_two[&ColumnId(1)].non_null_count, 3);

    writer.close().unwrap();

    // Stripe statistics merge both groups for every column in the subtree.
    let stripe_stats = writer.stripe_statistics();
    assert_eq!(stripe_stats.len(), 3);
    assert_eq!(stripe_stats[&ColumnId(1)].total_count, 6);
    assert_eq!(stripe_stats[&ColumnId(1)].non_null_count, 5);
    assert_eq!(stripe_stats[&ColumnId(2)].total_count, 5);

    let encodings = writer.column_encodings();
    assert_eq!(encodings.len(), 3);
    assert!(encodings
        .values()
        .all(|encoding| matches!(encoding, ColumnEncoding::Direct)));

    // Index streams: one per column, each carrying two row-group entries.
    let metadata = MetadataWriter::new(config.compression, config.compression_block_size);
    let index_streams = writer.index_streams(&metadata).unwrap();
    assert_eq!(index_streams.len(), 3);
    let columns: Vec<ColumnId> = index_streams.iter().map(|out| out.stream.column).collect();
    assert_eq!(columns, vec![ColumnId(1), ColumnId(2), ColumnId(3)]);
    for stream in &index_streams {
        assert_eq!(stream.stream.kind, StreamKind::RowIndex);
        let indexes: Vec<RowGroupIndex> = bincode::deserialize(&stream.bytes).unwrap();
        assert_eq!(indexes.len(), 2);
    }

    // Data streams: struct present bits first, then the children's data.
    let data_streams = writer.data_streams();
    assert_eq!(data_streams.len(), 3);
    assert_eq!(data_streams[0].stream.column, ColumnId(1));
    assert_eq!(data_streams[0].stream.kind, StreamKind::Present);
    // Six rows, bit pattern 101111, zero-padded.
    assert_eq!(data_streams[0].bytes, vec![0b1011_1100]);
    assert_eq!(data_streams[1].stream.column, ColumnId(2));
    assert_eq!(data_streams[1].stream.kind, StreamKind::Data);
    assert_eq!(data_streams[2].stream.column, ColumnId(3));

    // Children never emit their own present streams: after suppression they
    // only ever saw non-null values.
    assert!(data_streams[1..]
        .iter()
        .all(|out| out.stream.kind == StreamKind::Data));
}

#[test]
fn reset_replays_identical_bytes_for_identical_input() {
    let config = WriterConfig::uncompressed();
    let mut writer = ColumnWriter::new(&person_type(), &mut 1, &config);

    let run = |writer: &mut ColumnWriter| {
        writer.begin_row_group();
        writer
            .write_batch(&person_batch(
                vec![Some(7), None, Some(9)],
                vec![None, Some(8), Some(9)],
                Some(vec![true, true, false]),
            ))
            .unwrap();
        writer.finish_row_group();
        writer.close().unwrap();
        writer.data_streams()
    };

    let first = run(&mut writer);
    writer.reset();
    let second = run(&mut writer);
    assert_eq!(first, second);
    assert_eq!(writer.buffered_bytes(), 0);
}

#[test]
fn compressed_streams_carry_block_headers() {
    let config = WriterConfig::default();
    let mut writer = ColumnWriter::new(&ColumnType::Long, &mut 1, &config);
    writer.begin_row_group();
    let values: Vec<Option<i64>> = (0..10_000).map(Some).collect();
    let batch: ArrayRef = Arc::new(Int64Array::from(values));
    writer.write_batch(&batch).unwrap();
    writer.finish_row_group();
    writer.close().unwrap();

    let streams = writer.data_streams();
    assert_eq!(streams.len(), 1);
    let bytes = &streams[0].bytes;
    // Three-byte little-endian header: payload length and the verbatim flag.
    let header = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]);
    let payload_len = (header >> 1) as usize;
    assert_eq!(bytes.len(), 3 + payload_len);
}

#[test]
fn many_row_groups_index_every_group() {
    let config = WriterConfig::uncompressed();
    let mut writer = ColumnWriter::new(&ColumnType::Long, &mut 1, &config);
    let groups = 12;
    for group in 0..groups {
        writer.begin_row_group();
        let batch: ArrayRef = Arc::new(Int64Array::from(vec![Some(group as i64); 8]));
        writer.write_batch(&batch).unwrap();
        let stats = writer.finish_row_group();
        assert_eq!(stats[&ColumnId(1)].total_count, 8);
    }
    writer.close().unwrap();

    let metadata = MetadataWriter::new(config.compression, config.compression_block_size);
    let index_streams = writer.index_streams(&metadata).unwrap();
    let indexes: Vec<RowGroupIndex> = bincode::deserialize(&index_streams[0].bytes).unwrap();
    assert_eq!(indexes.len(), groups);
    // Positions advance monotonically through the data stream.
    let offsets: Vec<u64> = indexes.iter().map(|index| index.positions[1]).collect();
    let mut sorted = offsets.clone();
    sorted.sort_unstable();
    assert_eq!(offsets, sorted);
}
