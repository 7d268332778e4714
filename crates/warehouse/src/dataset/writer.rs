//! Encode record batches as Parquet or newline-delimited JSON bytes.

use arrow::json::LineDelimitedWriter;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::DatasetError;

/// Compression applied to JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JsonCompression {
    #[default]
    None,
    Zstd,
}

impl JsonCompression {
    /// File extension for objects written with this compression.
    pub fn extension(self) -> &'static str {
        match self {
            JsonCompression::None => "json",
            JsonCompression::Zstd => "json.zst",
        }
    }
}

/// Write a [`RecordBatch`] to an in-memory Parquet buffer.
///
/// Uses Zstd compression and stores `metadata` as key-value pairs in the
/// file footer.
pub fn write_parquet_bytes(
    batch: &RecordBatch,
    metadata: &[(&str, String)],
) -> Result<Vec<u8>, DatasetError> {
    let kv = metadata
        .iter()
        .map(|(k, v)| parquet::format::KeyValue::new(k.to_string(), Some(v.clone())))
        .collect();

    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(Default::default()))
        .set_key_value_metadata(Some(kv))
        .build();

    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;

    debug!(rows = batch.num_rows(), bytes = buf.len(), "Encoded Parquet");
    Ok(buf)
}

/// Write a [`RecordBatch`] as newline-delimited JSON, one object per row.
pub fn write_json_bytes(
    batch: &RecordBatch,
    compression: JsonCompression,
) -> Result<Vec<u8>, DatasetError> {
    let mut writer = LineDelimitedWriter::new(Vec::new());
    writer.write(batch)?;
    writer.finish()?;
    let buf = writer.into_inner();

    let out = match compression {
        JsonCompression::None => buf,
        JsonCompression::Zstd => zstd::encode_all(buf.as_slice(), 3)?,
    };

    debug!(rows = batch.num_rows(), bytes = out.len(), ?compression, "Encoded JSON");
    Ok(out)
}
