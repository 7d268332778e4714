//! Capability Client: one trait per external service.
//!
//! Everything above this module talks to the cloud only through these
//! traits, so tests can swap in scripted doubles and several differently
//! configured warehouses can coexist in one process.

mod error;
mod types;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

pub use error::{classify_code, ProviderError, ProviderErrorKind};
pub use types::*;

/// Object storage (S3).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create a bucket in `region`.
    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<(), ProviderError>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        tagging: Option<&str>,
    ) -> Result<(), ProviderError>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, ProviderError>;

    /// List one page of object versions and delete markers under `prefix`.
    async fn list_object_versions(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<&VersionMarker>,
    ) -> Result<ObjectVersionPage, ProviderError>;

    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<(), ProviderError>;
}

/// Metadata catalog (Glue Data Catalog).
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn create_database(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<(), ProviderError>;

    async fn get_table(&self, database: &str, table: &str)
        -> Result<TableDescription, ProviderError>;

    async fn get_table_versions(
        &self,
        database: &str,
        table: &str,
        max_results: i32,
        next_token: Option<&str>,
    ) -> Result<TableVersionPage, ProviderError>;

    async fn delete_table(&self, database: &str, table: &str) -> Result<(), ProviderError>;
}

/// Schema-discovery jobs (Glue crawlers).
#[async_trait]
pub trait Crawlers: Send + Sync {
    async fn create_crawler(&self, definition: &CrawlerDefinition) -> Result<(), ProviderError>;

    async fn get_crawler(&self, name: &str) -> Result<CrawlerStatus, ProviderError>;

    async fn start_crawler(&self, name: &str) -> Result<(), ProviderError>;
}

/// SQL query service (Athena).
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Submit a query and return its execution id.
    async fn start_query(&self, request: &QueryRequest) -> Result<String, ProviderError>;

    async fn query_status(&self, query_id: &str) -> Result<QueryStatus, ProviderError>;

    async fn stop_query(&self, query_id: &str) -> Result<(), ProviderError>;

    /// Fetch one page of results for a finished query.
    async fn result_page(
        &self,
        query_id: &str,
        next_token: Option<&str>,
    ) -> Result<ResultPage, ProviderError>;
}

/// Managed ingestion channels (Kinesis Data Firehose).
#[async_trait]
pub trait DeliveryStreams: Send + Sync {
    async fn describe_stream(&self, name: &str) -> Result<StreamDescription, ProviderError>;

    /// Create a stream and return its ARN.
    async fn create_stream(&self, definition: &StreamDefinition) -> Result<String, ProviderError>;

    /// Submit up to 500 records in one call. Individual records may still be
    /// rejected; see [`PutBatchOutcome::failed`].
    async fn put_record_batch(
        &self,
        stream: &str,
        records: &[Bytes],
    ) -> Result<PutBatchOutcome, ProviderError>;
}

/// Roles and policies (IAM + STS).
#[async_trait]
pub trait Identity: Send + Sync {
    /// Account id of the calling credentials.
    async fn caller_account(&self) -> Result<String, ProviderError>;

    /// Create a role and return its ARN.
    async fn create_role(&self, definition: &RoleDefinition) -> Result<String, ProviderError>;

    async fn attach_role_policy(&self, role: &str, policy_arn: &str) -> Result<(), ProviderError>;

    async fn put_role_policy(
        &self,
        role: &str,
        policy_name: &str,
        document: &str,
    ) -> Result<(), ProviderError>;
}

/// The full set of services a warehouse needs, shared read-only.
#[derive(Clone)]
pub struct Capabilities {
    pub objects: Arc<dyn ObjectStore>,
    pub catalog: Arc<dyn Catalog>,
    pub crawlers: Arc<dyn Crawlers>,
    pub queries: Arc<dyn QueryEngine>,
    pub streams: Arc<dyn DeliveryStreams>,
    pub identity: Arc<dyn Identity>,
}

impl Capabilities {
    /// Use one value that implements every service.
    pub fn from_shared<T>(cloud: Arc<T>) -> Self
    where
        T: ObjectStore + Catalog + Crawlers + QueryEngine + DeliveryStreams + Identity + 'static,
    {
        Self {
            objects: cloud.clone(),
            catalog: cloud.clone(),
            crawlers: cloud.clone(),
            queries: cloud.clone(),
            streams: cloud.clone(),
            identity: cloud,
        }
    }
}
