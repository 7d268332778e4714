//! Provider error classification.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// How a failed provider call should be treated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProviderErrorKind {
    /// The named resource does not exist.
    NotFound,
    /// A resource with that name already exists.
    AlreadyExists,
    /// Throttling, service hiccups, timeouts, eventual consistency.
    Transient,
    /// Anything else: bad input, permissions, quotas.
    Fatal,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderErrorKind::NotFound => "not found",
            ProviderErrorKind::AlreadyExists => "already exists",
            ProviderErrorKind::Transient => "transient",
            ProviderErrorKind::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// A failed call to one of the external services.
///
/// The raw provider code and message are preserved so callers see the same
/// diagnostics the service returned.
#[derive(Debug, Clone, Error)]
#[error("{} {} failed{}: {}", .service, .operation, code_suffix(.code), .message)]
pub struct ProviderError {
    pub service: &'static str,
    pub operation: &'static str,
    pub kind: ProviderErrorKind,
    pub code: Option<String>,
    pub message: String,
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default()
}

impl ProviderError {
    pub fn new(
        service: &'static str,
        operation: &'static str,
        kind: ProviderErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            service,
            operation,
            kind,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ProviderErrorKind::NotFound
    }

    pub fn is_already_exists(&self) -> bool {
        self.kind == ProviderErrorKind::AlreadyExists
    }

    pub fn is_transient(&self) -> bool {
        self.kind == ProviderErrorKind::Transient
    }
}

const NOT_FOUND_CODES: &[&str] = &[
    "EntityNotFoundException",
    "ResourceNotFoundException",
    "NoSuchEntity",
    "NoSuchKey",
    "NoSuchBucket",
    "NotFound",
];

const ALREADY_EXISTS_CODES: &[&str] = &[
    "AlreadyExistsException",
    "EntityAlreadyExists",
    "BucketAlreadyOwnedByYou",
    "ResourceInUseException",
];

const TRANSIENT_CODES: &[&str] = &[
    "ThrottlingException",
    "Throttling",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "SlowDown",
    "ServiceUnavailable",
    "ServiceUnavailableException",
    "ServiceFailure",
    "InternalFailure",
    "InternalServiceException",
    "InternalServerException",
    "RequestTimeout",
    "OperationTimeoutException",
    "ConcurrentModificationException",
];

/// Classify an AWS error code. Newly created IAM roles take a while to
/// become assumable, so Firehose's "unable to assume role" rejection is
/// treated as transient regardless of its code.
pub fn classify_code(code: Option<&str>, message: &str) -> ProviderErrorKind {
    if message.to_lowercase().contains("unable to assume role") {
        return ProviderErrorKind::Transient;
    }
    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => ProviderErrorKind::NotFound,
        Some(c) if ALREADY_EXISTS_CODES.contains(&c) => ProviderErrorKind::AlreadyExists,
        Some(c) if TRANSIENT_CODES.contains(&c) => ProviderErrorKind::Transient,
        _ => ProviderErrorKind::Fatal,
    }
}
