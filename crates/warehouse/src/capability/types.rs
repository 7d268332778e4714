//! Request and response shapes exchanged with the capability traits.
//!
//! These are deliberately narrower than the SDK types: only the fields the
//! warehouse reads or sets are modelled.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cheapo_core::ValidationError;

// ── Object store ──────────────────────────────────────────────

/// One version (or delete marker) of an object in a versioned bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectVersion {
    pub key: String,
    pub version_id: Option<String>,
    pub is_delete_marker: bool,
}

/// Continuation point for `ListObjectVersions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMarker {
    pub key_marker: String,
    pub version_id_marker: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectVersionPage {
    pub versions: Vec<ObjectVersion>,
    pub next: Option<VersionMarker>,
}

// ── Catalog ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    /// Catalog type string (e.g. "bigint", "string", "array<string>").
    pub data_type: Option<String>,
    pub comment: Option<String>,
}

/// Catalog metadata for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescription {
    pub name: String,
    pub database: Option<String>,
    pub location: Option<String>,
    pub table_type: Option<String>,
    pub columns: Vec<ColumnDef>,
    pub update_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableVersion {
    pub version_id: Option<String>,
    pub table: Option<TableDescription>,
}

#[derive(Debug, Clone, Default)]
pub struct TableVersionPage {
    pub versions: Vec<TableVersion>,
    pub next_token: Option<String>,
}

// ── Crawlers ──────────────────────────────────────────────────

/// What the crawler does with catalog tables whose schema changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UpdateBehavior {
    #[default]
    UpdateInDatabase,
    Log,
}

impl UpdateBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateBehavior::UpdateInDatabase => "UPDATE_IN_DATABASE",
            UpdateBehavior::Log => "LOG",
        }
    }
}

impl FromStr for UpdateBehavior {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "UPDATE_IN_DATABASE" => Ok(UpdateBehavior::UpdateInDatabase),
            "LOG" => Ok(UpdateBehavior::Log),
            other => Err(ValidationError::Invalid {
                field: "update_behavior".into(),
                reason: format!("unknown value {other:?}"),
            }),
        }
    }
}

/// What the crawler does with catalog tables whose data disappeared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeleteBehavior {
    #[default]
    DeleteFromDatabase,
    DeprecateInDatabase,
    Log,
}

impl DeleteBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeleteBehavior::DeleteFromDatabase => "DELETE_FROM_DATABASE",
            DeleteBehavior::DeprecateInDatabase => "DEPRECATE_IN_DATABASE",
            DeleteBehavior::Log => "LOG",
        }
    }
}

impl FromStr for DeleteBehavior {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DELETE_FROM_DATABASE" => Ok(DeleteBehavior::DeleteFromDatabase),
            "DEPRECATE_IN_DATABASE" => Ok(DeleteBehavior::DeprecateInDatabase),
            "LOG" => Ok(DeleteBehavior::Log),
            other => Err(ValidationError::Invalid {
                field: "delete_behavior".into(),
                reason: format!("unknown value {other:?}"),
            }),
        }
    }
}

/// Everything needed to register a crawler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlerDefinition {
    pub name: String,
    pub role: String,
    pub database: String,
    pub description: String,
    /// `bucket/prefix/` path the crawler scans.
    pub s3_target_path: String,
    pub table_prefix: Option<String>,
    /// Cron expression, e.g. `cron(15 12 * * ? *)`.
    pub schedule: Option<String>,
    pub update_behavior: UpdateBehavior,
    pub delete_behavior: DeleteBehavior,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrawlerState {
    Ready,
    Running,
    Stopping,
    Other(String),
}

impl CrawlerState {
    pub fn from_provider(state: &str) -> Self {
        match state {
            "READY" => CrawlerState::Ready,
            "RUNNING" => CrawlerState::Running,
            "STOPPING" => CrawlerState::Stopping,
            other => CrawlerState::Other(other.to_string()),
        }
    }

    /// RUNNING and STOPPING are the only states worth waiting on.
    pub fn is_busy(&self) -> bool {
        matches!(self, CrawlerState::Running | CrawlerState::Stopping)
    }
}

/// Outcome of the most recent crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastCrawl {
    /// SUCCEEDED, FAILED or CANCELLED.
    pub status: String,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlerStatus {
    pub name: String,
    pub state: CrawlerState,
    pub elapsed_ms: i64,
    pub last_crawl: Option<LastCrawl>,
}

// ── Queries ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub sql: String,
    pub database: String,
    pub output_location: String,
    pub workgroup: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl QueryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryState::Queued => "QUEUED",
            QueryState::Running => "RUNNING",
            QueryState::Succeeded => "SUCCEEDED",
            QueryState::Failed => "FAILED",
            QueryState::Cancelled => "CANCELLED",
        }
    }
}

/// Snapshot of a query execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStatus {
    pub query_id: String,
    pub state: QueryState,
    pub reason: Option<String>,
    pub bytes_scanned: u64,
    pub execution_time_ms: u64,
    pub output_location: Option<String>,
}

/// Column definition returned by a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryColumn {
    pub name: String,
    /// Query engine type (e.g. "varchar", "bigint", "double").
    pub data_type: String,
}

/// One page of query results. `rows` never contains the header echo.
#[derive(Debug, Clone, Default)]
pub struct ResultPage {
    pub columns: Vec<QueryColumn>,
    pub rows: Vec<Vec<Option<String>>>,
    pub next_token: Option<String>,
}

// ── Delivery streams ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamStatus {
    Creating,
    Active,
    /// DELETING, CREATING_FAILED, DELETING_FAILED, or anything newer.
    Other(String),
}

impl StreamStatus {
    pub fn from_provider(status: &str) -> Self {
        match status {
            "CREATING" => StreamStatus::Creating,
            "ACTIVE" => StreamStatus::Active,
            other => StreamStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamStatus::Creating => f.write_str("CREATING"),
            StreamStatus::Active => f.write_str("ACTIVE"),
            StreamStatus::Other(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescription {
    pub name: String,
    pub arn: String,
    pub status: StreamStatus,
}

/// Delivery-stream flush thresholds: whichever is hit first triggers a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferingHints {
    pub size_mb: i32,
    pub interval_seconds: i32,
}

impl Default for BufferingHints {
    fn default() -> Self {
        Self {
            size_mb: 5,
            interval_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Compression {
    #[default]
    Uncompressed,
    Gzip,
    Zip,
    Snappy,
    HadoopSnappy,
}

impl Compression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::Uncompressed => "UNCOMPRESSED",
            Compression::Gzip => "GZIP",
            Compression::Zip => "ZIP",
            Compression::Snappy => "Snappy",
            Compression::HadoopSnappy => "HADOOP_SNAPPY",
        }
    }
}

impl FromStr for Compression {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "UNCOMPRESSED" => Ok(Compression::Uncompressed),
            "GZIP" => Ok(Compression::Gzip),
            "ZIP" => Ok(Compression::Zip),
            "SNAPPY" => Ok(Compression::Snappy),
            "HADOOP_SNAPPY" => Ok(Compression::HadoopSnappy),
            other => Err(ValidationError::Invalid {
                field: "compression".into(),
                reason: format!("unknown value {other:?}"),
            }),
        }
    }
}

/// A direct-put delivery stream writing to one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDefinition {
    pub name: String,
    pub role_arn: String,
    pub bucket_arn: String,
    pub buffering: BufferingHints,
    pub compression: Compression,
    pub prefix: Option<String>,
    pub error_prefix: Option<String>,
}

/// A record the stream rejected within an otherwise accepted batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRecord {
    /// Position within the submitted batch.
    pub index: usize,
    pub error_code: String,
}

#[derive(Debug, Clone, Default)]
pub struct PutBatchOutcome {
    pub failed: Vec<FailedRecord>,
}

// ── Identity ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDefinition {
    pub name: String,
    pub path: String,
    pub description: String,
    /// JSON trust (assume-role) policy document.
    pub trust_policy: String,
}
