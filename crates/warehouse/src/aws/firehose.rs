use async_trait::async_trait;
use aws_sdk_firehose::primitives::Blob;
use aws_sdk_firehose::types::{
    BufferingHints, CompressionFormat, DeliveryStreamType, ExtendedS3DestinationConfiguration,
    Record,
};
use bytes::Bytes;
use tracing::debug;

use super::{invalid_request, missing_field, provider_error, AwsCapabilities};
use crate::capability::{
    DeliveryStreams, FailedRecord, ProviderError, PutBatchOutcome, StreamDefinition,
    StreamDescription, StreamStatus,
};

const SERVICE: &str = "firehose";

#[async_trait]
impl DeliveryStreams for AwsCapabilities {
    async fn describe_stream(&self, name: &str) -> Result<StreamDescription, ProviderError> {
        let resp = self
            .firehose
            .describe_delivery_stream()
            .delivery_stream_name(name)
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, "DescribeDeliveryStream", e))?;

        let desc = resp.delivery_stream_description().ok_or_else(|| {
            missing_field(SERVICE, "DescribeDeliveryStream", "DeliveryStreamDescription")
        })?;

        Ok(StreamDescription {
            name: desc.delivery_stream_name().to_string(),
            arn: desc.delivery_stream_arn().to_string(),
            status: StreamStatus::from_provider(desc.delivery_stream_status().as_str()),
        })
    }

    async fn create_stream(&self, definition: &StreamDefinition) -> Result<String, ProviderError> {
        let destination = s3_destination(definition)?;

        let resp = self
            .firehose
            .create_delivery_stream()
            .delivery_stream_name(&definition.name)
            .delivery_stream_type(DeliveryStreamType::DirectPut)
            .extended_s3_destination_configuration(destination)
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, "CreateDeliveryStream", e))?;

        resp.delivery_stream_arn()
            .map(str::to_string)
            .ok_or_else(|| missing_field(SERVICE, "CreateDeliveryStream", "DeliveryStreamARN"))
    }

    async fn put_record_batch(
        &self,
        stream: &str,
        records: &[Bytes],
    ) -> Result<PutBatchOutcome, ProviderError> {
        let records = records
            .iter()
            .map(|data| Record::builder().data(Blob::new(data.to_vec())).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| invalid_request(SERVICE, "PutRecordBatch", e))?;

        let resp = self
            .firehose
            .put_record_batch()
            .delivery_stream_name(stream)
            .set_records(Some(records))
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, "PutRecordBatch", e))?;

        let failed: Vec<FailedRecord> = resp
            .request_responses()
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                entry.error_code().map(|code| FailedRecord {
                    index,
                    error_code: code.to_string(),
                })
            })
            .collect();

        debug!(
            stream,
            failed_put_count = resp.failed_put_count(),
            failed = failed.len(),
            "PutRecordBatch response"
        );

        Ok(PutBatchOutcome { failed })
    }
}

/// Direct-put S3 destination for a new stream.
fn s3_destination(
    definition: &StreamDefinition,
) -> Result<ExtendedS3DestinationConfiguration, ProviderError> {
    ExtendedS3DestinationConfiguration::builder()
        .role_arn(&definition.role_arn)
        .bucket_arn(&definition.bucket_arn)
        .buffering_hints(
            BufferingHints::builder()
                .size_in_mbs(definition.buffering.size_mb)
                .interval_in_seconds(definition.buffering.interval_seconds)
                .build(),
        )
        .compression_format(CompressionFormat::from(definition.compression.as_str()))
        .set_prefix(definition.prefix.clone())
        .set_error_output_prefix(definition.error_prefix.clone())
        .build()
        .map_err(|e| invalid_request(SERVICE, "CreateDeliveryStream", e))
}
