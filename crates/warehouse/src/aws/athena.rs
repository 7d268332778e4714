use async_trait::async_trait;
use aws_sdk_athena::types::{QueryExecutionContext, QueryExecutionState, ResultConfiguration};
use tracing::debug;

use super::{missing_field, provider_error, AwsCapabilities};
use crate::capability::{
    ProviderError, QueryColumn, QueryEngine, QueryRequest, QueryState, QueryStatus, ResultPage,
};

const SERVICE: &str = "athena";

fn map_state(state: Option<&QueryExecutionState>) -> QueryState {
    match state {
        Some(QueryExecutionState::Succeeded) => QueryState::Succeeded,
        Some(QueryExecutionState::Failed) => QueryState::Failed,
        Some(QueryExecutionState::Cancelled) => QueryState::Cancelled,
        Some(QueryExecutionState::Running) => QueryState::Running,
        // Queued, missing, or a variant newer than this SDK.
        _ => QueryState::Queued,
    }
}

#[async_trait]
impl QueryEngine for AwsCapabilities {
    async fn start_query(&self, request: &QueryRequest) -> Result<String, ProviderError> {
        let resp = self
            .athena
            .start_query_execution()
            .query_string(&request.sql)
            .query_execution_context(
                QueryExecutionContext::builder()
                    .database(&request.database)
                    .build(),
            )
            .result_configuration(
                ResultConfiguration::builder()
                    .output_location(&request.output_location)
                    .build(),
            )
            .work_group(&request.workgroup)
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, "StartQueryExecution", e))?;

        resp.query_execution_id()
            .map(str::to_string)
            .ok_or_else(|| missing_field(SERVICE, "StartQueryExecution", "QueryExecutionId"))
    }

    async fn query_status(&self, query_id: &str) -> Result<QueryStatus, ProviderError> {
        let resp = self
            .athena
            .get_query_execution()
            .query_execution_id(query_id)
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, "GetQueryExecution", e))?;

        let qe = resp
            .query_execution()
            .ok_or_else(|| missing_field(SERVICE, "GetQueryExecution", "QueryExecution"))?;

        let status = qe.status();
        let stats = qe.statistics();

        Ok(QueryStatus {
            query_id: query_id.to_string(),
            state: map_state(status.and_then(|s| s.state())),
            reason: status
                .and_then(|s| s.state_change_reason())
                .map(str::to_string),
            bytes_scanned: stats
                .and_then(|s| s.data_scanned_in_bytes())
                .unwrap_or(0)
                .max(0) as u64,
            execution_time_ms: stats
                .and_then(|s| s.engine_execution_time_in_millis())
                .unwrap_or(0)
                .max(0) as u64,
            output_location: qe
                .result_configuration()
                .and_then(|rc| rc.output_location())
                .map(str::to_string),
        })
    }

    async fn stop_query(&self, query_id: &str) -> Result<(), ProviderError> {
        self.athena
            .stop_query_execution()
            .query_execution_id(query_id)
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, "StopQueryExecution", e))?;
        Ok(())
    }

    async fn result_page(
        &self,
        query_id: &str,
        next_token: Option<&str>,
    ) -> Result<ResultPage, ProviderError> {
        let first_page = next_token.is_none();
        let resp = self
            .athena
            .get_query_results()
            .query_execution_id(query_id)
            .set_next_token(next_token.map(str::to_string))
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, "GetQueryResults", e))?;

        let Some(result_set) = resp.result_set() else {
            return Ok(ResultPage {
                next_token: resp.next_token().map(str::to_string),
                ..Default::default()
            });
        };

        let columns: Vec<QueryColumn> = result_set
            .result_set_metadata()
            .map(|meta| {
                meta.column_info()
                    .iter()
                    .map(|ci| QueryColumn {
                        name: ci.name().to_string(),
                        data_type: ci.r#type().to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let raw_rows = result_set.rows();

        // SELECT results echo the header as the first row of the first page.
        let skip = usize::from(first_page && resp.update_count().is_none() && !raw_rows.is_empty());

        let rows: Vec<Vec<Option<String>>> = raw_rows
            .iter()
            .skip(skip)
            .map(|row| {
                row.data()
                    .iter()
                    .map(|datum| datum.var_char_value().map(str::to_string))
                    .collect()
            })
            .collect();

        debug!(
            query_id,
            columns = columns.len(),
            rows = rows.len(),
            "Fetched result page"
        );

        Ok(ResultPage {
            columns,
            rows,
            next_token: resp.next_token().map(str::to_string),
        })
    }
}
