//! Tagged results for idempotent provisioning and crawls.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result of a create-if-absent call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provisioned<T> {
    /// This call created the resource.
    Created(T),
    /// The resource was there already and was left untouched.
    AlreadyExists(T),
}

impl<T> Provisioned<T> {
    pub fn get(&self) -> &T {
        match self {
            Provisioned::Created(v) | Provisioned::AlreadyExists(v) => v,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Provisioned::Created(v) | Provisioned::AlreadyExists(v) => v,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Provisioned::Created(_))
    }
}

impl<T: fmt::Display> fmt::Display for Provisioned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provisioned::Created(v) => write!(f, "{v} (created)"),
            Provisioned::AlreadyExists(v) => write!(f, "{v} (already exists)"),
        }
    }
}

/// How a crawler run ended, as seen by [`crate::Warehouse::update_tables`].
///
/// A failed crawl is a value, not an error: callers have to match on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrawlOutcome {
    /// Started without waiting for completion.
    Started,
    Succeeded,
    Failed { reason: String },
    Cancelled,
}

impl CrawlOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CrawlOutcome::Started | CrawlOutcome::Succeeded)
    }
}

impl fmt::Display for CrawlOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlOutcome::Started => f.write_str("STARTED"),
            CrawlOutcome::Succeeded => f.write_str("SUCCEEDED"),
            CrawlOutcome::Failed { reason } => write!(f, "FAILED: {reason}"),
            CrawlOutcome::Cancelled => f.write_str("CANCELLED"),
        }
    }
}
