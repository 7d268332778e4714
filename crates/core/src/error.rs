use thiserror::Error;

/// Rejected caller input, raised before any provider call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid table name: {0:?}")]
    EmptyTableName(String),

    #[error("Table name must be a string, got {0}")]
    TableNameNotString(String),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: String, reason: String },
}
