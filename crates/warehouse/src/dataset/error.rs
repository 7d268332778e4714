//! Error types for dataset encoding.

/// Errors that can occur while building or encoding a dataset.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// Failed to build Arrow arrays from record data.
    #[error("Arrow conversion error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Failed to encode Parquet.
    #[error("Parquet write error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Failed to compress output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record was not a JSON object.
    #[error("Record {index} is not a JSON object")]
    NotAnObject { index: usize },

    #[error("Schema has no columns")]
    EmptySchema,
}
