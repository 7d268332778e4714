//! In-memory stand-in for every cloud service, with scripted responses for
//! the polling paths.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use cheapo_core::config::IngestConfig;
use cheapo_warehouse::capability::*;
use cheapo_warehouse::{Capabilities, Warehouse, WarehouseOptions};

pub const ACCOUNT: &str = "123456789012";
pub const ROLE_ARN: &str = "arn:aws:iam::123456789012:role/service-role/lake-CheapoDBExecutionRole";

fn err(service: &'static str, op: &'static str, kind: ProviderErrorKind) -> ProviderError {
    ProviderError::new(service, op, kind, format!("scripted {kind}"))
}

/// One scripted answer to a delivery-stream describe call.
#[derive(Debug, Clone)]
pub enum Describe {
    Missing,
    Status(StreamStatus),
    Error(ProviderErrorKind),
}

/// One scripted answer to a put-record-batch call.
#[derive(Debug, Clone)]
pub enum Put {
    /// Reject the records at these positions with ServiceUnavailableException.
    Reject(Vec<usize>),
    Error(ProviderErrorKind),
}

#[derive(Default)]
pub struct State {
    // object store
    pub buckets: Vec<(String, String)>,
    pub objects: HashMap<String, (Bytes, Option<String>)>,
    pub listed_versions: Vec<ObjectVersion>,
    pub deleted_objects: Vec<(String, Option<String>)>,

    // catalog
    pub databases: Vec<(String, Option<String>)>,
    pub tables: HashMap<String, TableDescription>,
    /// Version pages keyed by the continuation token that requests them.
    pub version_pages: HashMap<Option<String>, TableVersionPage>,
    pub version_tokens_seen: Vec<Option<String>>,
    pub deleted_tables: Vec<String>,

    // crawlers
    pub crawlers: HashMap<String, CrawlerDefinition>,
    pub crawler_creates: usize,
    pub crawler_starts: usize,
    pub crawler_gets: usize,
    pub crawler_script: VecDeque<Result<CrawlerStatus, ProviderErrorKind>>,

    // queries
    pub query_requests: Vec<QueryRequest>,
    pub query_states: VecDeque<(QueryState, Option<String>)>,
    pub result_pages: HashMap<Option<String>, ResultPage>,
    pub stopped_queries: Vec<String>,

    // streams
    pub stream_script: VecDeque<Describe>,
    pub stream_describes: usize,
    pub stream_creates: Vec<StreamDefinition>,
    pub put_script: VecDeque<Put>,
    pub put_calls: Vec<Vec<Bytes>>,
    /// How long each batch put stays in flight.
    pub put_latency: Option<Duration>,
    pub puts_in_flight: usize,
    pub peak_puts_in_flight: usize,

    // identity
    pub role_exists: bool,
    pub roles: Vec<RoleDefinition>,
    pub attached_policies: Vec<(String, String)>,
    pub inline_policies: Vec<(String, String, String)>,
    pub identity_calls: usize,
}

#[derive(Default)]
pub struct FakeCloud {
    pub state: Mutex<State>,
}

impl FakeCloud {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn capabilities(self: &Arc<Self>) -> Capabilities {
        Capabilities::from_shared(Arc::clone(self))
    }
}

/// Options for a warehouse named `lake` with a pre-existing role.
pub fn lake_options() -> WarehouseOptions {
    WarehouseOptions::new("lake")
        .iam_role_arn(ROLE_ARN)
        .region("eu-west-1")
        .ingest(IngestConfig::default())
}

pub async fn open_lake(fake: &Arc<FakeCloud>) -> Warehouse {
    Warehouse::open(fake.capabilities(), lake_options())
        .await
        .unwrap()
}

pub async fn open_lake_with(fake: &Arc<FakeCloud>, poll_timeout: Option<Duration>) -> Warehouse {
    Warehouse::open(fake.capabilities(), lake_options().poll_timeout(poll_timeout))
        .await
        .unwrap()
}

pub fn crawler_status(name: &str, state: CrawlerState, last: Option<(&str, Option<&str>)>) -> CrawlerStatus {
    CrawlerStatus {
        name: name.to_string(),
        state,
        elapsed_ms: 1_500,
        last_crawl: last.map(|(status, msg)| LastCrawl {
            status: status.to_string(),
            error_message: msg.map(str::to_string),
        }),
    }
}

pub fn table_description(name: &str, columns: &[(&str, &str)]) -> TableDescription {
    TableDescription {
        name: name.to_string(),
        database: Some("lake".to_string()),
        location: Some(format!("s3://lake/raw/{name}/")),
        table_type: Some("EXTERNAL_TABLE".to_string()),
        columns: columns
            .iter()
            .map(|(n, t)| ColumnDef {
                name: n.to_string(),
                data_type: Some(t.to_string()),
                comment: None,
            })
            .collect(),
        update_time: None,
    }
}

#[async_trait]
impl ObjectStore for FakeCloud {
    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<(), ProviderError> {
        self.with(|s| s.buckets.push((bucket.to_string(), region.to_string())));
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        tagging: Option<&str>,
    ) -> Result<(), ProviderError> {
        self.with(|s| {
            s.objects
                .insert(format!("{bucket}/{key}"), (body, tagging.map(str::to_string)))
        });
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, ProviderError> {
        self.with(|s| s.objects.get(&format!("{bucket}/{key}")).map(|(b, _)| b.clone()))
            .ok_or_else(|| err("s3", "GetObject", ProviderErrorKind::NotFound))
    }

    async fn list_object_versions(
        &self,
        _bucket: &str,
        prefix: &str,
        marker: Option<&VersionMarker>,
    ) -> Result<ObjectVersionPage, ProviderError> {
        // Two versions per page, continuing after the marker key.
        self.with(|s| {
            let matching: Vec<ObjectVersion> = s
                .listed_versions
                .iter()
                .filter(|v| v.key.starts_with(prefix))
                .cloned()
                .collect();
            let start = marker
                .and_then(|m| matching.iter().position(|v| v.key == m.key_marker))
                .map(|i| i + 1)
                .unwrap_or(0);
            let versions: Vec<ObjectVersion> = matching.iter().skip(start).take(2).cloned().collect();
            let next = if start + versions.len() < matching.len() {
                versions.last().map(|v| VersionMarker {
                    key_marker: v.key.clone(),
                    version_id_marker: v.version_id.clone(),
                })
            } else {
                None
            };
            Ok(ObjectVersionPage { versions, next })
        })
    }

    async fn delete_object(
        &self,
        _bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<(), ProviderError> {
        self.with(|s| {
            s.deleted_objects
                .push((key.to_string(), version_id.map(str::to_string)))
        });
        Ok(())
    }
}

#[async_trait]
impl Catalog for FakeCloud {
    async fn create_database(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<(), ProviderError> {
        self.with(|s| {
            s.databases
                .push((name.to_string(), description.map(str::to_string)))
        });
        Ok(())
    }

    async fn get_table(&self, _database: &str, table: &str) -> Result<TableDescription, ProviderError> {
        self.with(|s| s.tables.get(table).cloned())
            .ok_or_else(|| err("glue", "GetTable", ProviderErrorKind::NotFound))
    }

    async fn get_table_versions(
        &self,
        _database: &str,
        _table: &str,
        max_results: i32,
        next_token: Option<&str>,
    ) -> Result<TableVersionPage, ProviderError> {
        assert_eq!(max_results, 100);
        let token = next_token.map(str::to_string);
        self.with(|s| {
            s.version_tokens_seen.push(token.clone());
            Ok(s.version_pages.get(&token).cloned().unwrap_or_default())
        })
    }

    async fn delete_table(&self, _database: &str, table: &str) -> Result<(), ProviderError> {
        self.with(|s| {
            if s.tables.remove(table).is_some() {
                s.deleted_tables.push(table.to_string());
                Ok(())
            } else {
                Err(err("glue", "DeleteTable", ProviderErrorKind::NotFound))
            }
        })
    }
}

#[async_trait]
impl Crawlers for FakeCloud {
    async fn create_crawler(&self, definition: &CrawlerDefinition) -> Result<(), ProviderError> {
        self.with(|s| {
            if s.crawlers.contains_key(&definition.name) {
                return Err(err("glue", "CreateCrawler", ProviderErrorKind::AlreadyExists));
            }
            s.crawler_creates += 1;
            s.crawlers.insert(definition.name.clone(), definition.clone());
            Ok(())
        })
    }

    async fn get_crawler(&self, name: &str) -> Result<CrawlerStatus, ProviderError> {
        self.with(|s| {
            s.crawler_gets += 1;
            if let Some(next) = s.crawler_script.pop_front() {
                return next.map_err(|kind| err("glue", "GetCrawler", kind));
            }
            if s.crawlers.contains_key(name) {
                Ok(crawler_status(name, CrawlerState::Ready, None))
            } else {
                Err(err("glue", "GetCrawler", ProviderErrorKind::NotFound))
            }
        })
    }

    async fn start_crawler(&self, _name: &str) -> Result<(), ProviderError> {
        self.with(|s| s.crawler_starts += 1);
        Ok(())
    }
}

#[async_trait]
impl QueryEngine for FakeCloud {
    async fn start_query(&self, request: &QueryRequest) -> Result<String, ProviderError> {
        self.with(|s| {
            s.query_requests.push(request.clone());
            Ok(format!("q-{}", s.query_requests.len()))
        })
    }

    /// Walks the scripted states; the last one repeats.
    async fn query_status(&self, query_id: &str) -> Result<QueryStatus, ProviderError> {
        self.with(|s| {
            let (state, reason) = if s.query_states.len() > 1 {
                s.query_states.pop_front()
            } else {
                s.query_states.front().cloned()
            }
            .unwrap_or((QueryState::Succeeded, None));

            Ok(QueryStatus {
                query_id: query_id.to_string(),
                state,
                reason,
                bytes_scanned: 2_048,
                execution_time_ms: 120,
                output_location: Some(format!("s3://lake/results/{query_id}.csv")),
            })
        })
    }

    async fn stop_query(&self, query_id: &str) -> Result<(), ProviderError> {
        self.with(|s| s.stopped_queries.push(query_id.to_string()));
        Ok(())
    }

    async fn result_page(
        &self,
        _query_id: &str,
        next_token: Option<&str>,
    ) -> Result<ResultPage, ProviderError> {
        let token = next_token.map(str::to_string);
        self.with(|s| Ok(s.result_pages.get(&token).cloned().unwrap_or_default()))
    }
}

#[async_trait]
impl DeliveryStreams for FakeCloud {
    /// Walks the scripted answers; once they run out the stream is ACTIVE
    /// if it was ever created and missing otherwise.
    async fn describe_stream(&self, name: &str) -> Result<StreamDescription, ProviderError> {
        self.with(|s| {
            s.stream_describes += 1;
            let answer = s.stream_script.pop_front().unwrap_or_else(|| {
                if s.stream_creates.iter().any(|d| d.name == name) {
                    Describe::Status(StreamStatus::Active)
                } else {
                    Describe::Missing
                }
            });
            match answer {
                Describe::Missing => Err(err(
                    "firehose",
                    "DescribeDeliveryStream",
                    ProviderErrorKind::NotFound,
                )),
                Describe::Status(status) => Ok(StreamDescription {
                    name: name.to_string(),
                    arn: format!("arn:aws:firehose:eu-west-1:{ACCOUNT}:deliverystream/{name}"),
                    status,
                }),
                Describe::Error(kind) => Err(err("firehose", "DescribeDeliveryStream", kind)),
            }
        })
    }

    async fn create_stream(&self, definition: &StreamDefinition) -> Result<String, ProviderError> {
        self.with(|s| {
            s.stream_creates.push(definition.clone());
            Ok(format!(
                "arn:aws:firehose:eu-west-1:{ACCOUNT}:deliverystream/{}",
                definition.name
            ))
        })
    }

    async fn put_record_batch(
        &self,
        _stream: &str,
        records: &[Bytes],
    ) -> Result<PutBatchOutcome, ProviderError> {
        let latency = self.with(|s| {
            s.puts_in_flight += 1;
            s.peak_puts_in_flight = s.peak_puts_in_flight.max(s.puts_in_flight);
            s.put_latency
        });
        match latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }

        self.with(|s| {
            s.puts_in_flight -= 1;
            s.put_calls.push(records.to_vec());
            match s.put_script.pop_front() {
                None => Ok(PutBatchOutcome::default()),
                Some(Put::Reject(indexes)) => Ok(PutBatchOutcome {
                    failed: indexes
                        .into_iter()
                        .map(|index| FailedRecord {
                            index,
                            error_code: "ServiceUnavailableException".to_string(),
                        })
                        .collect(),
                }),
                Some(Put::Error(kind)) => Err(err("firehose", "PutRecordBatch", kind)),
            }
        })
    }
}

#[async_trait]
impl Identity for FakeCloud {
    async fn caller_account(&self) -> Result<String, ProviderError> {
        self.with(|s| s.identity_calls += 1);
        Ok(ACCOUNT.to_string())
    }

    async fn create_role(&self, definition: &RoleDefinition) -> Result<String, ProviderError> {
        self.with(|s| {
            s.identity_calls += 1;
            if s.role_exists {
                return Err(err("iam", "CreateRole", ProviderErrorKind::AlreadyExists));
            }
            s.roles.push(definition.clone());
            Ok(format!(
                "arn:aws:iam::{ACCOUNT}:role{}{}",
                definition.path, definition.name
            ))
        })
    }

    async fn attach_role_policy(&self, role: &str, policy_arn: &str) -> Result<(), ProviderError> {
        self.with(|s| {
            s.identity_calls += 1;
            s.attached_policies
                .push((role.to_string(), policy_arn.to_string()))
        });
        Ok(())
    }

    async fn put_role_policy(
        &self,
        role: &str,
        policy_name: &str,
        document: &str,
    ) -> Result<(), ProviderError> {
        self.with(|s| {
            s.identity_calls += 1;
            s.inline_policies.push((
                role.to_string(),
                policy_name.to_string(),
                document.to_string(),
            ))
        });
        Ok(())
    }
}
