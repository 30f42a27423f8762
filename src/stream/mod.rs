//! Output streams: the byte-level encoders behind every column writer.
//!
//! A column writer owns between one and four of these, all sharing the same
//! block-compression framing:
//!
//! - [`PresentOutputStream`]: the per-row null bitmap every writer owns,
//!   suppressed entirely for columns that never see a null;
//! - [`BooleanOutputStream`]: bit-packed booleans (also the boolean column's
//!   data stream);
//! - [`LongOutputStream`]: run-length-encoded integers for data and length
//!   streams;
//! - [`ByteDataOutputStream`]: raw payload bytes for binary and
//!   floating-point data.
//!
//! Each stream records one checkpoint per row group and can flatten it into
//! the fixed-arity position list the row-group index stores.

mod boolean;
mod byte_data;
mod long;
mod output;
mod present;

pub use boolean::BooleanOutputStream;
pub use byte_data::ByteDataOutputStream;
pub use long::LongOutputStream;
pub use output::{CompressedOutputStream, StreamPosition};
pub use present::PresentOutputStream;
