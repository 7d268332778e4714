//! AWS SDK implementations of the capability traits.
//!
//! [`AwsCapabilities`] owns one SDK client per service, all built from the
//! same session config, and implements every trait in
//! [`crate::capability`]. Each submodule covers one service.

mod athena;
mod firehose;
mod glue;
mod iam;
mod s3;

use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_types::region::Region;
use tracing::info;

use cheapo_core::config::AwsConfig;

use crate::capability::{classify_code, Capabilities, ProviderError, ProviderErrorKind};

/// SDK clients for every service the warehouse uses.
#[derive(Clone)]
pub struct AwsCapabilities {
    s3: aws_sdk_s3::Client,
    glue: aws_sdk_glue::Client,
    athena: aws_sdk_athena::Client,
    firehose: aws_sdk_firehose::Client,
    iam: aws_sdk_iam::Client,
    sts: aws_sdk_sts::Client,
}

impl AwsCapabilities {
    /// Build clients from explicit session settings.
    ///
    /// Static credentials are used when both key halves are configured,
    /// otherwise the SDK's default provider chain applies. An endpoint
    /// override (LocalStack and friends) also switches S3 to path-style
    /// addressing.
    pub async fn connect(aws: &AwsConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(aws.region.clone()));

        if let (Some(key_id), Some(secret)) = (&aws.access_key_id, &aws.secret_access_key) {
            let creds = Credentials::new(
                key_id,
                secret,
                aws.session_token.clone(),
                None,
                "cheapodb-static",
            );
            loader = loader.credentials_provider(creds);
        }

        let endpoint = aws.endpoint_url.as_deref().filter(|e| !e.is_empty());
        if let Some(endpoint) = endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(endpoint.is_some())
            .build();

        info!(
            region = %aws.region,
            static_credentials = aws.has_static_credentials(),
            endpoint = endpoint.unwrap_or("(default)"),
            "AWS clients initialised"
        );

        Self {
            s3: aws_sdk_s3::Client::from_conf(s3_config),
            glue: aws_sdk_glue::Client::new(&sdk_config),
            athena: aws_sdk_athena::Client::new(&sdk_config),
            firehose: aws_sdk_firehose::Client::new(&sdk_config),
            iam: aws_sdk_iam::Client::new(&sdk_config),
            sts: aws_sdk_sts::Client::new(&sdk_config),
        }
    }

    /// Share these clients as a [`Capabilities`] bundle.
    pub fn into_capabilities(self) -> Capabilities {
        Capabilities::from_shared(Arc::new(self))
    }
}

/// Convert an SDK error into a classified [`ProviderError`].
///
/// Transport-level failures (timeouts, dispatch and response errors) are
/// transient; service errors are classified by their AWS error code.
pub(crate) fn provider_error<E, R>(
    service: &'static str,
    operation: &'static str,
    err: SdkError<E, R>,
) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();
    let code = err
        .as_service_error()
        .and_then(|e| e.code())
        .map(str::to_string);

    let kind = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            ProviderErrorKind::Transient
        }
        _ => classify_code(code.as_deref(), &message),
    };

    ProviderError {
        service,
        operation,
        kind,
        code,
        message,
    }
}

/// A required field was missing from a provider response.
pub(crate) fn missing_field(
    service: &'static str,
    operation: &'static str,
    field: &str,
) -> ProviderError {
    ProviderError::new(
        service,
        operation,
        ProviderErrorKind::Fatal,
        format!("response did not include {field}"),
    )
}

/// A request could not be built from the given input.
pub(crate) fn invalid_request(
    service: &'static str,
    operation: &'static str,
    err: impl std::fmt::Display,
) -> ProviderError {
    ProviderError::new(service, operation, ProviderErrorKind::Fatal, err.to_string())
}
