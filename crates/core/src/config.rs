use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Firehose rejects `PutRecordBatch` calls with more than 500 records.
pub const MAX_BATCH_SIZE: usize = 500;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str) -> Option<T> {
    profiled_env_opt(profile, key).and_then(|v| v.parse().ok())
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub aws: AwsConfig,
    pub warehouse: WarehouseConfig,
    pub ingest: IngestConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `CHEAPO_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("CHEAPO_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            aws: AwsConfig::from_env_profiled(p),
            warehouse: WarehouseConfig::from_env_profiled(p),
            ingest: IngestConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  aws:        region={}, static_credentials={}",
            self.aws.region,
            self.aws.has_static_credentials()
        );
        tracing::info!(
            "  warehouse:  name={}, results_prefix={}, role={}",
            self.warehouse.name.as_deref().unwrap_or("(none)"),
            self.warehouse.results_prefix,
            self.warehouse.iam_role_arn.as_deref().unwrap_or("(none)")
        );
        tracing::info!(
            "  ingest:     batch_size={}, concurrency={}",
            self.ingest.batch_size,
            self.ingest.concurrency
        );
    }
}

// ── AWS session ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: String,
    pub access_key_id: Option<String>,
    #[serde(skip_serializing)]
    pub secret_access_key: Option<String>,
    #[serde(skip_serializing)]
    pub session_token: Option<String>,
    pub endpoint_url: Option<String>,
}

impl AwsConfig {
    fn from_env_profiled(p: &str) -> Self {
        let region = profiled_env_opt(p, "AWS_DEFAULT_REGION")
            .or_else(|| profiled_env_opt(p, "AWS_REGION"))
            .unwrap_or_else(|| "us-east-1".to_string());
        Self {
            region,
            access_key_id: profiled_env_opt(p, "AWS_ACCESS_KEY_ID"),
            secret_access_key: profiled_env_opt(p, "AWS_SECRET_ACCESS_KEY"),
            session_token: profiled_env_opt(p, "AWS_SESSION_TOKEN"),
            endpoint_url: profiled_env_opt(p, "AWS_ENDPOINT_URL"),
        }
    }

    /// True when both halves of a static key pair are present. Otherwise the
    /// SDK's default credential chain is used.
    pub fn has_static_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }
}

// ── Warehouse ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Bucket and Glue database name.
    pub name: Option<String>,
    pub description: Option<String>,
    /// Prefix inside the bucket where Athena writes query results.
    pub results_prefix: String,
    pub iam_role_arn: Option<String>,
    /// Create `<name>-CheapoDBExecutionRole` when no role ARN is supplied.
    pub create_iam_role: bool,
    pub workgroup: String,
    pub query_timeout_seconds: u32,
    /// Interval between crawler status checks.
    pub crawler_poll_seconds: u64,
    /// Upper bound on any crawler or stream wait; unset waits forever.
    pub poll_timeout_seconds: Option<u64>,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            name: None,
            description: None,
            results_prefix: "results/".to_string(),
            iam_role_arn: None,
            create_iam_role: false,
            workgroup: "primary".to_string(),
            query_timeout_seconds: 300,
            crawler_poll_seconds: 60,
            poll_timeout_seconds: None,
        }
    }
}

impl WarehouseConfig {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        Self {
            name: profiled_env_opt(p, "CHEAPO_WAREHOUSE"),
            description: profiled_env_opt(p, "CHEAPO_DESCRIPTION"),
            results_prefix: profiled_env_or(p, "CHEAPO_RESULTS_PREFIX", &defaults.results_prefix),
            iam_role_arn: profiled_env_opt(p, "CHEAPO_IAM_ROLE_ARN"),
            create_iam_role: profiled_env_bool(p, "CHEAPO_CREATE_IAM_ROLE", false),
            workgroup: profiled_env_or(p, "CHEAPO_WORKGROUP", &defaults.workgroup),
            query_timeout_seconds: profiled_env_parse(p, "CHEAPO_QUERY_TIMEOUT_SECONDS")
                .unwrap_or(defaults.query_timeout_seconds),
            crawler_poll_seconds: profiled_env_parse(p, "CHEAPO_CRAWLER_POLL_SECONDS")
                .unwrap_or(defaults.crawler_poll_seconds),
            poll_timeout_seconds: profiled_env_parse(p, "CHEAPO_POLL_TIMEOUT_SECONDS"),
        }
    }

    pub fn poll_timeout(&self) -> Option<Duration> {
        self.poll_timeout_seconds.map(Duration::from_secs)
    }
}

// ── Streaming ingestion ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Records per `PutRecordBatch` call, clamped to `1..=MAX_BATCH_SIZE`.
    pub batch_size: usize,
    /// Batches in flight at once.
    pub concurrency: usize,
    /// Interval between delivery-stream status checks while CREATING.
    pub stream_poll_seconds: u64,
    pub init_max_attempts: u32,
    pub put_max_attempts: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
            concurrency: 4,
            stream_poll_seconds: 10,
            init_max_attempts: 8,
            put_max_attempts: 3,
        }
    }
}

impl IngestConfig {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        Self {
            batch_size: profiled_env_parse::<usize>(p, "CHEAPO_BATCH_SIZE")
                .unwrap_or(defaults.batch_size)
                .clamp(1, MAX_BATCH_SIZE),
            concurrency: profiled_env_parse::<usize>(p, "CHEAPO_INGEST_CONCURRENCY")
                .unwrap_or(defaults.concurrency)
                .max(1),
            stream_poll_seconds: profiled_env_parse(p, "CHEAPO_STREAM_POLL_SECONDS")
                .unwrap_or(defaults.stream_poll_seconds),
            init_max_attempts: profiled_env_parse(p, "CHEAPO_INIT_MAX_ATTEMPTS")
                .unwrap_or(defaults.init_max_attempts),
            put_max_attempts: profiled_env_parse(p, "CHEAPO_PUT_MAX_ATTEMPTS")
                .unwrap_or(defaults.put_max_attempts),
        }
    }

    pub fn stream_poll_interval(&self) -> Duration {
        Duration::from_secs(self.stream_poll_seconds)
    }

    /// Backoff around the whole delivery-stream provisioning call.
    pub fn init_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(self.init_max_attempts)
    }

    /// Backoff around each record batch submission.
    pub fn put_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(self.put_max_attempts)
            .with_initial_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(5))
    }
}

// ── Tests ─────────────────────────────────────────────────────
