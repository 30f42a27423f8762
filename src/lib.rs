//! # colstripe - Columnar Stripe Writer
//!
//! `colstripe` encodes Arrow record batches into the stream layout of a
//! self-describing columnar file: per-column data streams, suppressed null
//! bitmaps, run-length integer encoding, block compression, row-group seek
//! indexes, and mergeable statistics.
//!
//! ## Key Features
//!
//! - **Writer tree**: one writer per column, composed the way the schema
//!   nests; struct, list, and map writers keep children in lock step and
//!   filter null rows out before delegating.
//!
//! - **Suppressed present streams**: a column with no nulls emits no null
//!   bitmap at all; readers infer all-present from its absence.
//!
//! - **Row-group indexes**: stream positions are checkpointed at every
//!   group boundary so readers can seek straight to a group and skip it on
//!   statistics alone.
//!
//! - **Block compression**: every stream passes through the same framed
//!   LZ4 or ZSTD block codec, with incompressible blocks stored verbatim.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use arrow::array::{ArrayRef, Int64Array};
//! use colstripe::schema::ColumnType;
//! use colstripe::writer::{ColumnWriter, WriterConfig};
//!
//! # fn main() -> Result<(), colstripe::writer::WriterError> {
//! let config = WriterConfig::default();
//! let mut writer = ColumnWriter::new(&ColumnType::Long, &mut 1, &config);
//!
//! writer.begin_row_group();
//! let batch: ArrayRef = Arc::new(Int64Array::from(vec![Some(1), None, Some(3)]));
//! writer.write_batch(&batch)?;
//! let group_statistics = writer.finish_row_group();
//! assert_eq!(group_statistics.len(), 1);
//!
//! writer.close()?;
//! let streams = writer.data_streams();
//! assert!(!streams.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! The host owns file layout: it decides row-group and stripe boundaries
//! (typically from [`ColumnWriter::buffered_bytes`]), assembles the drained
//! streams into stripes, and writes footers. This crate stops at finished,
//! framed stream bytes.
//!
//! [`ColumnWriter::buffered_bytes`]: writer::ColumnWriter::buffered_bytes

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
pub mod compression;
pub mod schema;
pub mod statistics;
pub mod stream;
pub mod stripe;
pub mod writer;

/// Commonly used types, importable in one line.
pub mod prelude {
    pub use crate::compression::CompressionKind;
    pub use crate::schema::{ColumnType, StructField};
    pub use crate::statistics::ColumnStatistics;
    pub use crate::stripe::{
        ColumnEncoding, ColumnId, MetadataWriter, StreamDataOutput, StreamKind,
    };
    pub use crate::writer::{ColumnWriter, WriterConfig, WriterError};
}
