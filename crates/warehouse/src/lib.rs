//! Serverless data warehouse over S3, Glue, Athena and Firehose.
//!
//! A [`Warehouse`] is one S3 bucket plus one Glue database of the same
//! name. All cloud access goes through [`capability::Capabilities`]; the
//! AWS-backed implementation lives in [`aws`].

pub mod aws;
pub mod capability;
pub mod crawler;
pub mod dataset;
pub mod error;
pub mod outcome;
pub mod query;
pub mod result;
pub mod security;
pub mod stream;
pub mod table;
pub mod warehouse;

pub use aws::AwsCapabilities;
pub use capability::{Capabilities, ProviderError, ProviderErrorKind};
pub use crawler::CrawlerOptions;
pub use error::WarehouseError;
pub use outcome::{CrawlOutcome, Provisioned};
pub use query::QueryCursor;
pub use result::{QueryResult, Row};
pub use stream::{DeliveryStream, IngestSummary, StreamOptions};
pub use table::Table;
pub use warehouse::{create_warehouse, Warehouse, WarehouseOptions};
