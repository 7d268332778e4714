//! Warehouse provisioning: one bucket plus one catalog database of the
//! same name, and the execution role that crawlers and streams run under.

use std::time::Duration;

use tracing::{debug, info};

use cheapo_core::config::IngestConfig;
use cheapo_core::{normalize_table_name, Config, ValidationError};

use crate::capability::Capabilities;
use crate::error::WarehouseError;
use crate::security;
use crate::stream::DeliveryStream;
use crate::table::Table;

/// Settings for opening or creating a warehouse.
///
/// Start from [`WarehouseOptions::new`] for built-in defaults or
/// [`WarehouseOptions::from_config`] for environment-driven ones, then
/// override individual fields with the builder methods.
#[derive(Debug, Clone)]
pub struct WarehouseOptions {
    pub name: String,
    pub description: Option<String>,
    pub iam_role_arn: Option<String>,
    pub create_iam_role: bool,
    pub results_prefix: String,
    pub region: String,
    pub workgroup: String,
    pub query_timeout: Duration,
    pub crawler_poll_interval: Duration,
    pub poll_timeout: Option<Duration>,
    pub ingest: IngestConfig,
}

impl WarehouseOptions {
    pub fn new(name: impl Into<String>) -> Self {
        let defaults = cheapo_core::config::WarehouseConfig::default();
        Self {
            name: name.into(),
            description: None,
            iam_role_arn: None,
            create_iam_role: false,
            results_prefix: defaults.results_prefix,
            region: "us-east-1".to_string(),
            workgroup: defaults.workgroup,
            query_timeout: Duration::from_secs(defaults.query_timeout_seconds as u64),
            crawler_poll_interval: Duration::from_secs(defaults.crawler_poll_seconds),
            poll_timeout: None,
            ingest: IngestConfig::default(),
        }
    }

    /// Options from loaded configuration. `CHEAPO_WAREHOUSE` must be set.
    pub fn from_config(config: &Config) -> Result<Self, WarehouseError> {
        let name = config.warehouse.name.clone().ok_or_else(|| {
            WarehouseError::Configuration(
                "no warehouse name configured; set CHEAPO_WAREHOUSE".to_string(),
            )
        })?;
        let wh = &config.warehouse;
        Ok(Self {
            name,
            description: wh.description.clone(),
            iam_role_arn: wh.iam_role_arn.clone(),
            create_iam_role: wh.create_iam_role,
            results_prefix: wh.results_prefix.clone(),
            region: config.aws.region.clone(),
            workgroup: wh.workgroup.clone(),
            query_timeout: Duration::from_secs(wh.query_timeout_seconds as u64),
            crawler_poll_interval: Duration::from_secs(wh.crawler_poll_seconds),
            poll_timeout: wh.poll_timeout(),
            ingest: config.ingest.clone(),
        })
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn iam_role_arn(mut self, arn: impl Into<String>) -> Self {
        self.iam_role_arn = Some(arn.into());
        self
    }

    pub fn create_iam_role(mut self, create: bool) -> Self {
        self.create_iam_role = create;
        self
    }

    pub fn results_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.results_prefix = prefix.into();
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn workgroup(mut self, workgroup: impl Into<String>) -> Self {
        self.workgroup = workgroup.into();
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn poll_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn ingest(mut self, ingest: IngestConfig) -> Self {
        self.ingest = ingest;
        self
    }
}

/// A provisioned (or about to be provisioned) warehouse.
///
/// Holding a `Warehouse` means an execution role ARN has been resolved.
pub struct Warehouse {
    caps: Capabilities,
    name: String,
    description: Option<String>,
    role_arn: String,
    results_prefix: String,
    region: String,
    workgroup: String,
    query_timeout: Duration,
    crawler_poll_interval: Duration,
    poll_timeout: Option<Duration>,
    ingest: IngestConfig,
}

impl Warehouse {
    /// Resolve the execution role without touching the bucket or database.
    ///
    /// An explicit role ARN is used as-is. Otherwise the role is created
    /// when `create_iam_role` is set, and the call fails when it is not.
    pub async fn open(caps: Capabilities, options: WarehouseOptions) -> Result<Self, WarehouseError> {
        let name = options.name.trim().to_string();
        if name.is_empty() {
            return Err(WarehouseError::Configuration(
                "warehouse name must not be empty".to_string(),
            ));
        }

        let role_arn = match (options.iam_role_arn, options.create_iam_role) {
            (Some(arn), _) => arn,
            (None, true) => security::create_execution_role(&caps, &name, &options.region).await?,
            (None, false) => {
                return Err(WarehouseError::Configuration(
                    "No IAM role ARN provided and create_iam_role was false. \
                     Provide either an existing role ARN or enable create_iam_role."
                        .to_string(),
                ))
            }
        };

        debug!(warehouse = %name, role = %role_arn, "Warehouse opened");

        Ok(Self {
            caps,
            name,
            description: options.description,
            role_arn,
            results_prefix: options.results_prefix,
            region: options.region,
            workgroup: options.workgroup,
            query_timeout: options.query_timeout,
            crawler_poll_interval: options.crawler_poll_interval,
            poll_timeout: options.poll_timeout,
            ingest: options.ingest,
        })
    }

    /// Create the bucket and the catalog database. Neither is checked for
    /// prior existence; the provider's error is returned as-is.
    pub async fn create(&self) -> Result<(), WarehouseError> {
        info!(warehouse = %self.name, region = %self.region, "Creating warehouse");

        self.caps.objects.create_bucket(&self.name, &self.region).await?;
        debug!(bucket = %self.name, "Bucket created");

        self.caps
            .catalog
            .create_database(&self.name, self.description.as_deref())
            .await?;
        debug!(database = %self.name, "Catalog database created");

        info!(warehouse = %self.name, "Warehouse created");
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn role_arn(&self) -> &str {
        &self.role_arn
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn workgroup(&self) -> &str {
        &self.workgroup
    }

    pub fn results_prefix(&self) -> &str {
        &self.results_prefix
    }

    /// Default query results destination: `s3://<bucket>/<results_prefix>`.
    pub fn results_location(&self) -> String {
        format!("s3://{}/{}", self.name, self.results_prefix)
    }

    pub fn bucket_arn(&self) -> String {
        format!("arn:aws:s3:::{}", self.name)
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    pub fn ingest_config(&self) -> &IngestConfig {
        &self.ingest
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    pub fn crawler_poll_interval(&self) -> Duration {
        self.crawler_poll_interval
    }

    pub fn poll_timeout(&self) -> Option<Duration> {
        self.poll_timeout
    }

    /// A table stored under `<prefix>/<name>/` in this warehouse's bucket.
    pub fn table(&self, name: &str, prefix: &str) -> Result<Table<'_>, ValidationError> {
        Ok(Table::new(self, normalize_table_name(name)?, prefix))
    }

    /// A delivery stream writing into this warehouse's bucket.
    pub fn stream(&self, name: impl Into<String>) -> DeliveryStream<'_> {
        DeliveryStream::new(self, name.into())
    }
}

/// Resolve the role, then create the bucket and database.
pub async fn create_warehouse(
    caps: Capabilities,
    options: WarehouseOptions,
) -> Result<Warehouse, WarehouseError> {
    let warehouse = Warehouse::open(caps, options).await?;
    warehouse.create().await?;
    Ok(warehouse)
}
