/// Errors that can occur while writing column data.
///
/// These cover resource and conversion failures only. Contract violations
/// (writing to a closed writer, empty batches, extracting streams before
/// close) are programming errors and panic instead; a writer that returned
/// an error must be discarded, not reused.
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    /// The schema or batch used an Arrow type the writer does not encode
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// A batch did not match the writer's column shape
    #[error("batch does not match column: {0}")]
    ColumnMismatch(String),

    /// Error from the Arrow library during cast/filter/concat operations
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error serializing row-group indexes
    #[error("index serialization error: {0}")]
    IndexSerialization(#[from] bincode::Error),

    /// I/O error from a compression codec
    #[error("compression error: {0}")]
    Compression(#[from] std::io::Error),
}
