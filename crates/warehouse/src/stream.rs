//! Firehose delivery streams: idempotent provisioning and chunked,
//! concurrent record ingestion.

use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use cheapo_core::config::{IngestConfig, MAX_BATCH_SIZE};

use crate::capability::{
    BufferingHints, Compression, StreamDefinition, StreamDescription, StreamStatus,
};
use crate::error::WarehouseError;
use crate::outcome::Provisioned;
use crate::warehouse::Warehouse;

/// Destination settings for a new delivery stream.
#[derive(Debug, Clone, Default)]
pub struct StreamOptions {
    /// Defaults to 5 MB / 300 s.
    pub buffering: Option<BufferingHints>,
    pub compression: Compression,
    /// Key prefix for delivered objects.
    pub prefix: Option<String>,
    /// Key prefix for records Firehose failed to deliver.
    pub error_prefix: Option<String>,
}

/// Totals for one [`DeliveryStream::from_records`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub records: usize,
    pub batches: usize,
    /// Records sent more than once because an earlier attempt rejected them.
    pub resubmitted: usize,
}

/// A named delivery stream into one warehouse's bucket.
pub struct DeliveryStream<'a> {
    warehouse: &'a Warehouse,
    name: String,
    ingest: IngestConfig,
}

impl<'a> DeliveryStream<'a> {
    pub(crate) fn new(warehouse: &'a Warehouse, name: String) -> Self {
        Self {
            ingest: warehouse.ingest_config().clone(),
            warehouse,
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Override ingestion settings for this handle only.
    pub fn with_ingest_config(mut self, ingest: IngestConfig) -> Self {
        self.ingest = ingest;
        self
    }

    /// Current description, or `None` when the stream does not exist.
    pub async fn describe(&self) -> Result<Option<StreamDescription>, WarehouseError> {
        match self.warehouse.capabilities().streams.describe_stream(&self.name).await {
            Ok(desc) => {
                debug!(stream = %self.name, status = %desc.status, "Describe delivery stream");
                Ok(Some(desc))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Create the stream unless it exists, then wait until it is ACTIVE.
    ///
    /// Returns the stream ARN. Transient provider failures re-run the whole
    /// call under the configured backoff; a stream that lands in any status
    /// other than ACTIVE or CREATING fails immediately with
    /// [`WarehouseError::StreamStatus`].
    pub async fn initialize(
        &self,
        options: StreamOptions,
    ) -> Result<Provisioned<String>, WarehouseError> {
        let policy = self.ingest.init_retry_policy();
        policy
            .run(
                "initialize delivery stream",
                WarehouseError::is_transient,
                || self.try_initialize(&options),
            )
            .await
    }

    async fn try_initialize(
        &self,
        options: &StreamOptions,
    ) -> Result<Provisioned<String>, WarehouseError> {
        if let Some(existing) = self.describe().await? {
            return match existing.status {
                StreamStatus::Active => {
                    debug!(stream = %self.name, "Delivery stream already active");
                    Ok(Provisioned::AlreadyExists(existing.arn))
                }
                StreamStatus::Creating => {
                    info!(stream = %self.name, "Delivery stream is being created, waiting");
                    let desc = self.wait_until_active().await?;
                    Ok(Provisioned::AlreadyExists(desc.arn))
                }
                StreamStatus::Other(status) => Err(WarehouseError::StreamStatus {
                    name: self.name.clone(),
                    status,
                }),
            };
        }

        let definition = StreamDefinition {
            name: self.name.clone(),
            role_arn: self.warehouse.role_arn().to_string(),
            bucket_arn: self.warehouse.bucket_arn(),
            buffering: options.buffering.unwrap_or_default(),
            compression: options.compression,
            prefix: options.prefix.clone(),
            error_prefix: options.error_prefix.clone(),
        };

        info!(
            stream = %self.name,
            bucket = %definition.bucket_arn,
            compression = definition.compression.as_str(),
            "Creating delivery stream"
        );

        let created = match self
            .warehouse
            .capabilities()
            .streams
            .create_stream(&definition)
            .await
        {
            Ok(arn) => {
                debug!(stream = %self.name, arn = %arn, "CreateDeliveryStream accepted");
                true
            }
            Err(e) if e.is_already_exists() => {
                debug!(stream = %self.name, "Delivery stream created concurrently");
                false
            }
            Err(e) => return Err(e.into()),
        };

        let desc = self.wait_until_active().await?;
        info!(stream = %self.name, arn = %desc.arn, "Delivery stream active");

        Ok(if created {
            Provisioned::Created(desc.arn)
        } else {
            Provisioned::AlreadyExists(desc.arn)
        })
    }

    /// Poll on a fixed interval while the stream is CREATING. A stream not
    /// yet visible right after creation counts as still creating.
    async fn wait_until_active(&self) -> Result<StreamDescription, WarehouseError> {
        let interval = self.ingest.stream_poll_interval();
        let deadline = self.warehouse.poll_timeout();
        let started = Instant::now();

        loop {
            match self.describe().await? {
                Some(desc) if desc.status == StreamStatus::Active => return Ok(desc),
                Some(StreamDescription {
                    status: StreamStatus::Other(status),
                    ..
                }) => {
                    return Err(WarehouseError::StreamStatus {
                        name: self.name.clone(),
                        status,
                    })
                }
                _ => {}
            }

            if let Some(limit) = deadline {
                if started.elapsed() + interval > limit {
                    return Err(WarehouseError::Timeout {
                        operation: format!("delivery stream {}", self.name),
                        seconds: limit.as_secs(),
                    });
                }
            }

            debug!(stream = %self.name, wait_secs = interval.as_secs(), "Delivery stream still creating");
            tokio::time::sleep(interval).await;
        }
    }

    /// Push records through the stream.
    ///
    /// Records are serialized as one JSON document per line and grouped
    /// into batches of at most the configured batch size (never more than
    /// 500), keeping source order within each batch. Batches are built
    /// lazily and at most `concurrency` are in flight. Each batch is
    /// retried under the put retry policy, resending only the records the
    /// stream rejected. The first batch that still fails aborts the call.
    pub async fn from_records<I, T>(
        &self,
        records: I,
        concurrency: usize,
    ) -> Result<IngestSummary, WarehouseError>
    where
        I: IntoIterator<Item = T>,
        T: Serialize,
    {
        let batch_size = self.ingest.batch_size.clamp(1, MAX_BATCH_SIZE);
        let concurrency = concurrency.max(1);
        info!(stream = %self.name, batch_size, concurrency, "Ingesting records");

        let batches = chunked(records.into_iter(), batch_size)
            .enumerate()
            .map(|(index, chunk)| encode_batch(&chunk).map(|payload| (index, payload)));

        let summary = stream::iter(batches)
            .map(|encoded| async move {
                let (index, payload) = encoded?;
                self.put_batch(index, payload).await
            })
            .buffer_unordered(concurrency)
            .try_fold(IngestSummary::default(), |mut acc, sent| async move {
                acc.records += sent.records;
                acc.batches += 1;
                acc.resubmitted += sent.resubmitted;
                Ok(acc)
            })
            .await?;

        info!(
            stream = %self.name,
            records = summary.records,
            batches = summary.batches,
            resubmitted = summary.resubmitted,
            "Ingestion complete"
        );
        Ok(summary)
    }

    async fn put_batch(
        &self,
        index: usize,
        records: Vec<Bytes>,
    ) -> Result<IngestSummary, WarehouseError> {
        let policy = self.ingest.put_retry_policy();
        let streams = &self.warehouse.capabilities().streams;
        let total = records.len();
        let mut pending = records;
        let mut resubmitted = 0;
        let mut attempt = 1;

        loop {
            let err = match streams.put_record_batch(&self.name, &pending).await {
                Ok(outcome) if outcome.failed.is_empty() => {
                    debug!(stream = %self.name, batch = index, records = total, attempt, "Batch delivered");
                    return Ok(IngestSummary {
                        records: total,
                        batches: 1,
                        resubmitted,
                    });
                }
                Ok(outcome) => {
                    let rejected: Vec<Bytes> = outcome
                        .failed
                        .iter()
                        .filter_map(|f| pending.get(f.index).cloned())
                        .collect();
                    let error_code = outcome.failed[0].error_code.clone();
                    pending = rejected;
                    WarehouseError::PartialBatch {
                        stream: self.name.clone(),
                        failed: pending.len(),
                        total,
                        error_code,
                    }
                }
                Err(e) => WarehouseError::from(e),
            };

            if attempt >= policy.max_attempts || !err.is_transient() {
                return Err(err);
            }

            let delay = policy.delay_for(attempt);
            warn!(
                stream = %self.name,
                batch = index,
                attempt,
                max_attempts = policy.max_attempts,
                pending = pending.len(),
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying record batch"
            );
            resubmitted += pending.len();
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn encode_batch<T: Serialize>(records: &[T]) -> Result<Vec<Bytes>, WarehouseError> {
    records
        .iter()
        .map(|r| {
            let mut line = serde_json::to_vec(r)?;
            line.push(b'\n');
            Ok(Bytes::from(line))
        })
        .collect()
}

/// Lazily group an iterator into vectors of `size` items (the last one may
/// be shorter).
pub(crate) fn chunked<I: Iterator>(mut iter: I, size: usize) -> impl Iterator<Item = Vec<I::Item>> {
    let size = size.max(1);
    std::iter::from_fn(move || {
        let chunk: Vec<I::Item> = iter.by_ref().take(size).collect();
        (!chunk.is_empty()).then_some(chunk)
    })
}
