//! Encode records as Parquet or JSON for upload into a table's prefix.
//!
//! Records are coerced against an explicit [`TableSchema`] supplied by the
//! caller, so every written file carries the column types the crawler should
//! register. Parquet output is Zstd-compressed; JSON output is newline
//! delimited, optionally Zstd-compressed.

mod error;
pub(crate) mod schema;
pub(crate) mod builders;
mod writer;


pub use error::DatasetError;
pub use schema::{ColumnSpec, ColumnType, TableSchema};
pub use builders::records_to_batch;
pub use writer::{write_json_bytes, write_parquet_bytes, JsonCompression};
