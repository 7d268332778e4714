//! Athena query execution with backoff polling and lazy, paged row access.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::stream::{self, Stream};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::capability::{Capabilities, QueryColumn, QueryEngine, QueryRequest, QueryState, QueryStatus};
use crate::error::WarehouseError;
use crate::result::{zip_row, QueryResult, Row};
use crate::warehouse::Warehouse;

const INITIAL_POLL_DELAY_MS: u64 = 200;
const MAX_POLL_DELAY_MS: u64 = 2_000;
const POLL_BACKOFF_FACTOR: f64 = 1.5;

impl Warehouse {
    /// Run `sql` in this warehouse's database and wait for it to succeed.
    ///
    /// Results are written to `results_path`, or to
    /// [`Warehouse::results_location`] when none is given. Rows are fetched
    /// lazily from the returned cursor.
    pub async fn query(
        &self,
        sql: &str,
        results_path: Option<&str>,
    ) -> Result<QueryCursor, WarehouseError> {
        let location = results_path
            .map(str::to_string)
            .unwrap_or_else(|| self.results_location());
        self.execute(sql, location).await
    }

    /// Run `sql` with results written to `results_path`. The caller usually
    /// consumes the result files there rather than the rows.
    pub async fn export(
        &self,
        sql: &str,
        results_path: &str,
    ) -> Result<QueryCursor, WarehouseError> {
        self.execute(sql, results_path.to_string()).await
    }

    async fn execute(&self, sql: &str, output_location: String) -> Result<QueryCursor, WarehouseError> {
        let caps = self.capabilities();
        let request = QueryRequest {
            sql: sql.to_string(),
            database: self.name().to_string(),
            output_location,
            workgroup: self.workgroup().to_string(),
        };

        info!(sql = %sql, database = %request.database, output = %request.output_location, "Starting query");
        let query_id = caps.queries.start_query(&request).await?;
        info!(query_id = %query_id, "Query execution started");

        let status = poll_until_complete(caps.queries.as_ref(), &query_id, self.query_timeout()).await?;
        info!(
            query_id = %query_id,
            bytes_scanned = status.bytes_scanned,
            execution_time_ms = status.execution_time_ms,
            "Query succeeded"
        );

        Ok(QueryCursor {
            caps: caps.clone(),
            status,
        })
    }
}

/// Poll the query until it reaches a terminal state or `timeout` passes.
///
/// Polls start 200 ms apart and back off by 1.5x up to 2 s, plus up to
/// 100 ms of jitter. On timeout a stop request is sent (errors ignored).
async fn poll_until_complete(
    queries: &dyn QueryEngine,
    query_id: &str,
    timeout: Duration,
) -> Result<QueryStatus, WarehouseError> {
    let start = Instant::now();
    let mut delay_ms = INITIAL_POLL_DELAY_MS;

    loop {
        let status = queries.query_status(query_id).await?;
        debug!(
            query_id,
            state = status.state.as_str(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Polling query status"
        );

        match status.state {
            QueryState::Succeeded => return Ok(status),
            QueryState::Failed => {
                let reason = status.reason.unwrap_or_else(|| "unknown".to_string());
                error!(query_id, reason = %reason, "Query failed");
                return Err(WarehouseError::QueryFailed {
                    query_id: query_id.to_string(),
                    reason,
                });
            }
            QueryState::Cancelled => {
                warn!(query_id, "Query was cancelled");
                return Err(WarehouseError::QueryCancelled {
                    query_id: query_id.to_string(),
                });
            }
            QueryState::Queued | QueryState::Running => {}
        }

        if start.elapsed() > timeout {
            warn!(query_id, timeout_secs = timeout.as_secs(), "Query timed out, cancelling");
            if let Err(e) = queries.stop_query(query_id).await {
                warn!(query_id, error = %e, "Failed to cancel timed-out query");
            }
            return Err(WarehouseError::Timeout {
                operation: format!("query {query_id}"),
                seconds: timeout.as_secs(),
            });
        }

        let jitter_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos()
            % 100;
        tokio::time::sleep(Duration::from_millis(delay_ms + jitter_ms as u64)).await;

        delay_ms = ((delay_ms as f64 * POLL_BACKOFF_FACTOR) as u64).min(MAX_POLL_DELAY_MS);
    }
}

/// Handle to a succeeded query's results.
pub struct QueryCursor {
    caps: Capabilities,
    status: QueryStatus,
}

impl QueryCursor {
    pub fn query_id(&self) -> &str {
        &self.status.query_id
    }

    pub fn status(&self) -> &QueryStatus {
        &self.status
    }

    /// Where the query engine wrote the result file.
    pub fn output_location(&self) -> Option<&str> {
        self.status.output_location.as_deref()
    }

    /// Stream rows one at a time, fetching result pages as needed.
    pub fn rows(&self) -> impl Stream<Item = Result<Row, WarehouseError>> + Send + 'static {
        let queries = Arc::clone(&self.caps.queries);
        let query_id = self.status.query_id.clone();

        stream::try_unfold(Pager::default(), move |pager| {
            let queries = Arc::clone(&queries);
            let query_id = query_id.clone();
            async move { next_row(queries.as_ref(), &query_id, pager).await }
        })
    }

    /// Fetch every page into memory.
    pub async fn collect(self) -> Result<QueryResult, WarehouseError> {
        let mut columns: Vec<QueryColumn> = Vec::new();
        let mut rows = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page = self
                .caps
                .queries
                .result_page(&self.status.query_id, token.as_deref())
                .await?;
            if columns.is_empty() {
                columns = page.columns;
            }
            rows.extend(page.rows);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        debug!(query_id = %self.status.query_id, rows = rows.len(), "Collected query results");
        Ok(QueryResult {
            columns,
            rows,
            metadata: self.status,
        })
    }
}

#[derive(Default)]
struct Pager {
    columns: Vec<QueryColumn>,
    buffered: VecDeque<Vec<Option<String>>>,
    next_token: Option<String>,
    exhausted: bool,
}

async fn next_row(
    queries: &dyn QueryEngine,
    query_id: &str,
    mut pager: Pager,
) -> Result<Option<(Row, Pager)>, WarehouseError> {
    loop {
        if let Some(cells) = pager.buffered.pop_front() {
            let row = zip_row(&pager.columns, &cells);
            return Ok(Some((row, pager)));
        }
        if pager.exhausted {
            return Ok(None);
        }

        let page = queries
            .result_page(query_id, pager.next_token.as_deref())
            .await?;
        debug!(query_id, rows = page.rows.len(), "Fetched result page");

        if pager.columns.is_empty() {
            pager.columns = page.columns;
        }
        pager.buffered.extend(page.rows);
        pager.exhausted = page.next_token.is_none();
        pager.next_token = page.next_token;
    }
}
