//! Column type tree and its mapping from Arrow schemas.
//!
//! The writer tree mirrors this type tree one writer per node. Column ids
//! are assigned by pre-order traversal once at construction and never
//! change; every statistics map, encoding map, and stream descriptor is
//! keyed by them.

use arrow::datatypes::{DataType, Field, Schema, TimeUnit};

use crate::writer::WriterError;

/// A named field inside a struct column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructField {
    /// Field name, kept for the file footer's type description.
    pub name: String,
    /// Field type.
    pub column_type: ColumnType,
}

/// The closed set of column shapes the writer supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    /// Bit-packed booleans.
    Boolean,
    /// Any integer width, encoded as 64-bit run-length integers.
    Long,
    /// Any float width, encoded as little-endian 64-bit IEEE 754.
    Double,
    /// Raw bytes with a length stream.
    Binary,
    /// UTF-8 bytes with a length stream.
    String,
    /// Seconds plus sub-second nanos in two integer streams.
    Timestamp,
    /// Nested record; cardinality driven entirely by the present stream.
    Struct(Vec<StructField>),
    /// Variable-length sequence of one element type.
    List(Box<ColumnType>),
    /// Variable-length sequence of key/value pairs.
    Map(Box<ColumnType>, Box<ColumnType>),
}

impl ColumnType {
    /// Number of columns in this subtree, including this node.
    pub fn column_count(&self) -> u32 {
        match self {
            ColumnType::Struct(fields) => {
                1 + fields
                    .iter()
                    .map(|field| field.column_type.column_count())
                    .sum::<u32>()
            }
            ColumnType::List(element) => 1 + element.column_count(),
            ColumnType::Map(key, value) => 1 + key.column_count() + value.column_count(),
            _ => 1,
        }
    }

    /// Maps an Arrow data type onto a column type.
    pub fn from_arrow(data_type: &DataType) -> Result<Self, WriterError> {
        match data_type {
            DataType::Boolean => Ok(ColumnType::Boolean),
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::Date32 => Ok(ColumnType::Long),
            DataType::Float16 | DataType::Float32 | DataType::Float64 => Ok(ColumnType::Double),
            DataType::Utf8 | DataType::LargeUtf8 => Ok(ColumnType::String),
            DataType::Binary | DataType::LargeBinary => Ok(ColumnType::Binary),
            DataType::Timestamp(
                TimeUnit::Second
                | TimeUnit::Millisecond
                | TimeUnit::Microsecond
                | TimeUnit::Nanosecond,
                _,
            ) => Ok(ColumnType::Timestamp),
            DataType::Struct(fields) => {
                let fields = fields
                    .iter()
                    .map(|field| {
                        Ok(StructField {
                            name: field.name().clone(),
                            column_type: ColumnType::from_arrow(field.data_type())?,
                        })
                    })
                    .collect::<Result<Vec<_>, WriterError>>()?;
                Ok(ColumnType::Struct(fields))
            }
            DataType::List(element) | DataType::LargeList(element) => Ok(ColumnType::List(
                Box::new(ColumnType::from_arrow(element.data_type())?),
            )),
            DataType::Map(entries, _) => match entries.data_type() {
                DataType::Struct(kv) if kv.len() == 2 => Ok(ColumnType::Map(
                    Box::new(ColumnType::from_arrow(kv[0].data_type())?),
                    Box::new(ColumnType::from_arrow(kv[1].data_type())?),
                )),
                other => Err(WriterError::UnsupportedType(format!(
                    "map entries must be a two-field struct, got {other}"
                ))),
            },
            other => Err(WriterError::UnsupportedType(other.to_string())),
        }
    }

    /// Maps a whole Arrow schema onto named top-level column types, in
    /// declaration order.
    pub fn from_arrow_schema(schema: &Schema) -> Result<Vec<(String, ColumnType)>, WriterError> {
        schema
            .fields()
            .iter()
            .map(|field| Ok((field.name().clone(), Self::from_arrow_field(field)?)))
            .collect()
    }

    /// Maps a single Arrow field onto a column type.
    pub fn from_arrow_field(field: &Field) -> Result<Self, WriterError> {
        Self::from_arrow(field.data_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::Fields;

    #[test]
    fn flat_types_map_directly() {
        assert_eq!(
            ColumnType::from_arrow(&DataType::Int32).unwrap(),
            ColumnType::Long
        );
        assert_eq!(
            ColumnType::from_arrow(&DataType::Utf8).unwrap(),
            ColumnType::String
        );
        assert_eq!(ColumnType::Long.column_count(), 1);
    }

    #[test]
    fn nested_types_count_descendants() {
        let fields = Fields::from(vec![
            Field::new("a", DataType::Int64, true),
            Field::new(
                "b",
                DataType::List(Field::new("item", DataType::Utf8, true).into()),
                true,
            ),
        ]);
        let column_type = ColumnType::from_arrow(&DataType::Struct(fields)).unwrap();
        // struct + a + list + element
        assert_eq!(column_type.column_count(), 4);
    }

    #[test]
    fn unsupported_types_are_rejected() {
        let result = ColumnType::from_arrow(&DataType::UInt64);
        assert!(matches!(result, Err(WriterError::UnsupportedType(_))));
    }
}
