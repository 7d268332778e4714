use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use bytes::Bytes;
use tracing::debug;

use super::{provider_error, AwsCapabilities};
use crate::capability::{
    ObjectStore, ObjectVersion, ObjectVersionPage, ProviderError, ProviderErrorKind, VersionMarker,
};

const SERVICE: &str = "s3";

#[async_trait]
impl ObjectStore for AwsCapabilities {
    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<(), ProviderError> {
        let mut req = self.s3.create_bucket().bucket(bucket);

        // us-east-1 rejects an explicit location constraint.
        if region != "us-east-1" {
            req = req.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }

        let resp = req
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, "CreateBucket", e))?;
        debug!(bucket, location = ?resp.location(), "CreateBucket response");
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        tagging: Option<&str>,
    ) -> Result<(), ProviderError> {
        let size = body.len();
        let resp = self
            .s3
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .set_tagging(tagging.map(str::to_string))
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, "PutObject", e))?;
        debug!(bucket, key, size, etag = ?resp.e_tag(), "PutObject response");
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, ProviderError> {
        let resp = self
            .s3
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, "GetObject", e))?;

        let data = resp.body.collect().await.map_err(|e| {
            ProviderError::new(SERVICE, "GetObject", ProviderErrorKind::Transient, e.to_string())
        })?;
        Ok(data.into_bytes())
    }

    async fn list_object_versions(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<&VersionMarker>,
    ) -> Result<ObjectVersionPage, ProviderError> {
        let resp = self
            .s3
            .list_object_versions()
            .bucket(bucket)
            .prefix(prefix)
            .set_key_marker(marker.map(|m| m.key_marker.clone()))
            .set_version_id_marker(marker.and_then(|m| m.version_id_marker.clone()))
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, "ListObjectVersions", e))?;

        let mut versions: Vec<ObjectVersion> = resp
            .versions()
            .iter()
            .filter_map(|v| {
                v.key().map(|key| ObjectVersion {
                    key: key.to_string(),
                    version_id: v.version_id().map(str::to_string),
                    is_delete_marker: false,
                })
            })
            .collect();

        versions.extend(resp.delete_markers().iter().filter_map(|m| {
            m.key().map(|key| ObjectVersion {
                key: key.to_string(),
                version_id: m.version_id().map(str::to_string),
                is_delete_marker: true,
            })
        }));

        let next = if resp.is_truncated().unwrap_or(false) {
            resp.next_key_marker().map(|key| VersionMarker {
                key_marker: key.to_string(),
                version_id_marker: resp.next_version_id_marker().map(str::to_string),
            })
        } else {
            None
        };

        Ok(ObjectVersionPage { versions, next })
    }

    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<(), ProviderError> {
        self.s3
            .delete_object()
            .bucket(bucket)
            .key(key)
            .set_version_id(version_id.map(str::to_string))
            .send()
            .await
            .map_err(|e| provider_error(SERVICE, "DeleteObject", e))?;
        Ok(())
    }
}
