//! Table-name normalization.

use serde_json::Value;

use crate::error::ValidationError;

/// Trim a table name and reject it when nothing is left.
pub fn normalize_table_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyTableName(name.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Normalize a table name arriving as loosely-typed JSON (CLI manifests,
/// record payloads). Anything other than a JSON string is rejected.
pub fn table_name_from_value(value: &Value) -> Result<String, ValidationError> {
    match value {
        Value::String(s) => normalize_table_name(s),
        other => Err(ValidationError::TableNameNotString(json_kind(other).to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
