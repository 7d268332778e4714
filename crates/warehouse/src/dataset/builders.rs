//! Build typed Arrow arrays from JSON records.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, StringBuilder,
    TimestampMillisecondBuilder,
};
use arrow::record_batch::RecordBatch;
use serde_json::{Map, Value};
use tracing::debug;

use super::error::DatasetError;
use super::schema::{ColumnType, TableSchema};

/// Coerce JSON object records into a [`RecordBatch`] shaped by `schema`.
///
/// Each value is converted to its column's declared type: numbers and
/// numeric strings become integers or doubles, `"true"`/`"1"` become
/// booleans, RFC 3339 and `YYYY-mm-dd HH:MM:SS` strings become timestamps.
/// Missing fields and unconvertible values become NULL. Fields not named in
/// the schema are dropped.
pub fn records_to_batch(records: &[Value], schema: &TableSchema) -> Result<RecordBatch, DatasetError> {
    if schema.is_empty() {
        return Err(DatasetError::EmptySchema);
    }

    let objects: Vec<&Map<String, Value>> = records
        .iter()
        .enumerate()
        .map(|(index, r)| r.as_object().ok_or(DatasetError::NotAnObject { index }))
        .collect::<Result<_, _>>()?;

    let num_rows = objects.len();
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(schema.columns.len());
    let mut coerced_to_null = 0usize;

    for col in &schema.columns {
        let values = objects.iter().map(|o| o.get(&col.name).filter(|v| !v.is_null()));

        let array: ArrayRef = match col.column_type {
            ColumnType::BigInt => {
                let mut builder = Int64Builder::with_capacity(num_rows);
                for value in values {
                    match value.map(as_i64) {
                        Some(Some(v)) => builder.append_value(v),
                        Some(None) => {
                            coerced_to_null += 1;
                            builder.append_null()
                        }
                        None => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            ColumnType::Double => {
                let mut builder = Float64Builder::with_capacity(num_rows);
                for value in values {
                    match value.map(as_f64) {
                        Some(Some(v)) => builder.append_value(v),
                        Some(None) => {
                            coerced_to_null += 1;
                            builder.append_null()
                        }
                        None => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            ColumnType::Boolean => {
                let mut builder = BooleanBuilder::with_capacity(num_rows);
                for value in values {
                    match value.map(as_bool) {
                        Some(Some(v)) => builder.append_value(v),
                        Some(None) => {
                            coerced_to_null += 1;
                            builder.append_null()
                        }
                        None => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            ColumnType::Timestamp => {
                let mut builder = TimestampMillisecondBuilder::with_capacity(num_rows);
                for value in values {
                    match value.map(as_timestamp_ms) {
                        Some(Some(v)) => builder.append_value(v),
                        Some(None) => {
                            coerced_to_null += 1;
                            builder.append_null()
                        }
                        None => builder.append_null(),
                    }
                }
                Arc::new(builder.finish().with_timezone("UTC"))
            }
            ColumnType::String => {
                let mut builder = StringBuilder::with_capacity(num_rows, num_rows * 32);
                for value in values {
                    match value {
                        Some(Value::String(s)) => builder.append_value(s),
                        // Nested or scalar values keep their JSON text.
                        Some(other) => builder.append_value(other.to_string()),
                        None => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
        };

        arrays.push(array);
    }

    if coerced_to_null > 0 {
        debug!(coerced_to_null, rows = num_rows, "Unconvertible values written as NULL");
    }

    Ok(RecordBatch::try_new(Arc::new(schema.to_arrow()), arrays)?)
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(*b as i64),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Integers are taken as epoch milliseconds.
fn as_timestamp_ms(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => parse_timestamp_ms(s.trim()),
        _ => None,
    }
}

/// Parse a timestamp string into epoch milliseconds.
///
/// Supported formats:
/// 1. RFC 3339: `2025-06-14T10:30:00Z`
/// 2. Space-separated: `2025-06-14 10:30:00` (optionally with fraction)
/// 3. Date only: `2025-06-14` (midnight UTC)
pub(crate) fn parse_timestamp_ms(value: &str) -> Option<i64> {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc).timestamp_millis());
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(ndt.and_utc().timestamp_millis());
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(ndt.and_utc().timestamp_millis());
    }
    if let Ok(nd) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(nd.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis());
    }
    None
}
