//! Glue crawler orchestration: idempotent creation and run-to-completion.

use std::time::Duration;

use chrono::Local;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::capability::{CrawlerDefinition, CrawlerStatus, DeleteBehavior, UpdateBehavior};
use crate::error::WarehouseError;
use crate::outcome::{CrawlOutcome, Provisioned};
use crate::warehouse::Warehouse;

/// Optional crawler settings.
#[derive(Debug, Clone, Default)]
pub struct CrawlerOptions {
    /// Cron expression, e.g. `cron(15 12 * * ? *)`.
    pub schedule: Option<String>,
    /// Prepended to the names of tables the crawler creates.
    pub table_prefix: Option<String>,
    pub update_behavior: UpdateBehavior,
    pub delete_behavior: DeleteBehavior,
}

impl Warehouse {
    /// Create a crawler over `s3://<bucket>/<name>/`.
    ///
    /// An existing crawler with the same name is returned as
    /// [`Provisioned::AlreadyExists`]; its settings are not updated.
    pub async fn create_crawler(
        &self,
        name: &str,
        options: CrawlerOptions,
    ) -> Result<Provisioned<String>, WarehouseError> {
        let caps = self.capabilities();
        let definition = CrawlerDefinition {
            name: name.to_string(),
            role: self.role_arn().to_string(),
            database: self.name().to_string(),
            description: format!(
                "Crawler created by CheapoDB on {}",
                Local::now().format("%Y-%m-%d %H:%M:%S")
            ),
            s3_target_path: format!("{}/{}/", self.name(), name),
            table_prefix: options.table_prefix,
            schedule: options.schedule,
            update_behavior: options.update_behavior,
            delete_behavior: options.delete_behavior,
        };

        debug!(crawler = name, path = %definition.s3_target_path, "Creating crawler");
        let created = match caps.crawlers.create_crawler(&definition).await {
            Ok(()) => true,
            Err(e) if e.is_already_exists() => {
                debug!(crawler = name, "Crawler already exists");
                false
            }
            Err(e) => return Err(e.into()),
        };

        let resolved = caps.crawlers.get_crawler(name).await?.name;
        if created {
            info!(crawler = %resolved, "Crawler created");
            Ok(Provisioned::Created(resolved))
        } else {
            Ok(Provisioned::AlreadyExists(resolved))
        }
    }

    /// Start a crawler and optionally wait for it.
    ///
    /// With `wait = None` (or zero) this returns [`CrawlOutcome::Started`]
    /// right after the start call. Otherwise the crawler is polled every
    /// `wait` until it leaves RUNNING/STOPPING. Describe errors while
    /// polling are returned immediately. The configured poll timeout, if
    /// any, bounds the total wait.
    pub async fn update_tables(
        &self,
        crawler: &str,
        wait: Option<Duration>,
    ) -> Result<CrawlOutcome, WarehouseError> {
        let caps = self.capabilities();
        info!(crawler, "Updating tables with crawler");
        caps.crawlers.start_crawler(crawler).await?;

        let Some(interval) = wait.filter(|w| !w.is_zero()) else {
            return Ok(CrawlOutcome::Started);
        };

        info!(crawler, interval_secs = interval.as_secs(), "Waiting for table update to complete");
        let started = Instant::now();

        loop {
            let status = caps.crawlers.get_crawler(crawler).await?;
            debug!(crawler, state = ?status.state, elapsed_ms = status.elapsed_ms, "Crawler status");

            if !status.state.is_busy() {
                let outcome = crawl_outcome(&status);
                info!(crawler, outcome = %outcome, "Crawler finished");
                return Ok(outcome);
            }

            info!(
                crawler,
                state = ?status.state,
                elapsed_secs = status.elapsed_ms as f64 / 1000.0,
                "Crawler still running"
            );

            if let Some(limit) = self.poll_timeout() {
                if started.elapsed() + interval > limit {
                    return Err(WarehouseError::Timeout {
                        operation: format!("crawler {crawler}"),
                        seconds: limit.as_secs(),
                    });
                }
            }

            tokio::time::sleep(interval).await;
        }
    }
}

/// Map the last-crawl record of an idle crawler to an outcome. A crawler
/// with no recorded run is reported as failed.
fn crawl_outcome(status: &CrawlerStatus) -> CrawlOutcome {
    let Some(last) = &status.last_crawl else {
        return CrawlOutcome::Failed {
            reason: "crawler has no recorded run".to_string(),
        };
    };

    match last.status.as_str() {
        "SUCCEEDED" => CrawlOutcome::Succeeded,
        "CANCELLED" => CrawlOutcome::Cancelled,
        other => CrawlOutcome::Failed {
            reason: last
                .error_message
                .clone()
                .unwrap_or_else(|| format!("last crawl status {other}")),
        },
    }
}
