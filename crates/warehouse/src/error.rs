//! Warehouse error type.

use cheapo_core::ValidationError;

use crate::capability::ProviderError;
use crate::dataset::DatasetError;

/// Errors surfaced by warehouse operations.
///
/// Provider failures are passed through untouched in [`WarehouseError::Provider`];
/// only a few "already exists" / "not found" outcomes are turned into
/// dedicated variants or no-ops by the operations that expect them.
#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    /// Missing or contradictory settings.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The execution role for this warehouse exists already and will not be
    /// reused without the caller vouching for it.
    #[error(
        "Role already exists for warehouse {warehouse}: {role_name}. \
         Provide the role ARN as iam_role_arn."
    )]
    RoleAlreadyExists { warehouse: String, role_name: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The delivery stream landed in a state other than ACTIVE or CREATING.
    #[error("Delivery stream {name} status was {status}, expected ACTIVE or CREATING")]
    StreamStatus { name: String, status: String },

    #[error("Query {query_id} failed: {reason}")]
    QueryFailed { query_id: String, reason: String },

    #[error("Query {query_id} was cancelled")]
    QueryCancelled { query_id: String },

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    /// Some records in a batch were still rejected after every retry.
    #[error("{failed} of {total} records rejected by delivery stream {stream} ({error_code})")]
    PartialBatch {
        stream: String,
        failed: usize,
        total: usize,
        error_code: String,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WarehouseError {
    /// Whether retrying the same call could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            WarehouseError::Provider(e) => e.is_transient(),
            WarehouseError::PartialBatch { .. } => true,
            _ => false,
        }
    }
}
