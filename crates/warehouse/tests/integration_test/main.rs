//! Integration tests for cheapo-warehouse.
//!
//! Every test runs against the in-memory `FakeCloud`; no AWS credentials
//! or network access are needed. Polling tests use paused tokio time so
//! sleep intervals can be counted exactly.

mod fake;

mod crawler;
mod provisioning;
mod table;
