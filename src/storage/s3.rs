//! S3 object store
//!
//! Uses the official AWS SDK. Works against AWS S3 and S3-compatible services
//! (MinIO, LocalStack) through a custom endpoint with path-style addressing.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client as AwsS3Client;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::{debug, info, warn};

use super::{ObjectStore, ObjectSummary, StorageError, StorageResult};
use crate::config::S3Settings;
use crate::core::task::ObjectLocation;
use crate::error::Result;

/// Largest object a single CopyObject call accepts (5 GiB)
const MAX_SINGLE_COPY_BYTES: u64 = 5 * 1024 * 1024 * 1024;

/// Part size used for multipart copies of larger objects
const MULTIPART_COPY_PART_BYTES: u64 = 512 * 1024 * 1024;

/// Characters escaped in the `x-amz-copy-source` header; `/` separates key segments
const COPY_SOURCE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Object store backed by S3
#[derive(Clone)]
pub struct S3Store {
    client: AwsS3Client,
}

impl S3Store {
    /// Create a new store from configuration
    pub async fn new(config: &S3Settings) -> Result<Self> {
        config.validate()?;
        let client = Self::build_aws_client(config).await;
        Ok(Self { client })
    }

    /// Wrap an already configured SDK client
    pub fn from_client(client: AwsS3Client) -> Self {
        Self { client }
    }

    async fn build_aws_client(config: &S3Settings) -> AwsS3Client {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        let region_provider = if let Some(region) = &config.region {
            RegionProviderChain::first_try(Region::new(region.clone()))
        } else {
            RegionProviderChain::default_provider()
        };
        loader = loader.region(region_provider);

        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            let credentials = Credentials::new(
                access_key,
                secret_key,
                config.session_token.clone(),
                None,
                "parcel-s3-explicit",
            );
            loader = loader.credentials_provider(credentials);
        }

        let aws_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&aws_config);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }
        if config.timeout_seconds > 0 {
            let timeout_config = aws_sdk_s3::config::timeout::TimeoutConfig::builder()
                .operation_timeout(Duration::from_secs(config.timeout_seconds))
                .build();
            builder = builder.timeout_config(timeout_config);
        }

        AwsS3Client::from_conf(builder.build())
    }

    fn copy_source(source: &ObjectLocation) -> String {
        format!(
            "{}/{}",
            source.bucket,
            utf8_percent_encode(&source.key, COPY_SOURCE_ENCODE_SET)
        )
    }

    /// Abandon a multipart upload so its parts are not billed
    async fn abort_upload(&self, destination: &ObjectLocation, upload_id: &str) {
        if let Err(e) = self
            .client
            .abort_multipart_upload()
            .bucket(&destination.bucket)
            .key(&destination.key)
            .upload_id(upload_id)
            .send()
            .await
        {
            warn!(upload_id, "Failed to abort multipart upload to {}: {}", destination, e);
        }
    }

    async fn copy_multipart(
        &self,
        source: &ObjectLocation,
        destination: &ObjectLocation,
        size: u64,
    ) -> StorageResult<()> {
        let upload = self
            .client
            .create_multipart_upload()
            .bucket(&destination.bucket)
            .key(&destination.key)
            .send()
            .await?;
        let upload_id = upload.upload_id().map(str::to_string).ok_or_else(|| {
            StorageError::Sdk("CreateMultipartUpload returned no upload id".to_string())
        })?;

        let mut parts = Vec::new();
        let mut offset = 0u64;
        let mut part_number = 1i32;
        while offset < size {
            let end = (offset + MULTIPART_COPY_PART_BYTES).min(size) - 1;
            let result = self
                .client
                .upload_part_copy()
                .bucket(&destination.bucket)
                .key(&destination.key)
                .upload_id(&upload_id)
                .part_number(part_number)
                .copy_source(Self::copy_source(source))
                .copy_source_range(format!("bytes={}-{}", offset, end))
                .send()
                .await;

            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    self.abort_upload(destination, &upload_id).await;
                    return Err(e.into());
                }
            };

            let etag = response
                .copy_part_result()
                .and_then(|r| r.e_tag())
                .map(str::to_string);
            parts.push(
                CompletedPart::builder()
                    .set_e_tag(etag)
                    .part_number(part_number)
                    .build(),
            );

            debug!(part = part_number, offset, end, "Copied part of {}", source);
            offset = end + 1;
            part_number += 1;
        }

        let completed = self
            .client
            .complete_multipart_upload()
            .bucket(&destination.bucket)
            .key(&destination.key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await;
        if let Err(e) = completed {
            self.abort_upload(destination, &upload_id).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn object_size(&self, location: &ObjectLocation) -> StorageResult<Option<u64>> {
        match self
            .client
            .head_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
        {
            Ok(response) => {
                if response.delete_marker().unwrap_or(false) {
                    return Ok(None);
                }
                Ok(Some(response.content_length().unwrap_or(0).max(0) as u64))
            }
            Err(e) => {
                let not_found = e
                    .as_service_error()
                    .map(|se| se.is_not_found())
                    .unwrap_or(false)
                    || e.raw_response()
                        .map(|r| r.status().as_u16() == 404)
                        .unwrap_or(false);
                if not_found {
                    Ok(None)
                } else {
                    Err(StorageError::from(e))
                }
            }
        }
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<ObjectSummary>> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(bucket).prefix(prefix);
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let response = request.send().await?;
            objects.extend(response.contents().iter().filter_map(|obj| {
                Some(ObjectSummary {
                    key: obj.key()?.to_string(),
                    size: obj.size().unwrap_or(0).max(0) as u64,
                })
            }));

            match (
                response.is_truncated().unwrap_or(false),
                response.next_continuation_token(),
            ) {
                (true, Some(token)) => continuation_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(bucket, prefix, count = objects.len(), "Listed objects");
        Ok(objects)
    }

    async fn copy_object(
        &self,
        source: &ObjectLocation,
        destination: &ObjectLocation,
    ) -> StorageResult<()> {
        let size = self.object_size(source).await?.ok_or_else(|| StorageError::Service {
            code: "NoSuchKey".to_string(),
            message: format!("{} does not exist", source),
        })?;

        if size > MAX_SINGLE_COPY_BYTES {
            info!(size, "Using multipart copy for {} -> {}", source, destination);
            return self.copy_multipart(source, destination, size).await;
        }

        self.client
            .copy_object()
            .bucket(&destination.bucket)
            .key(&destination.key)
            .copy_source(Self::copy_source(source))
            .send()
            .await?;
        Ok(())
    }

    async fn delete_object(&self, location: &ObjectLocation) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "s3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_source_format() {
        let loc = ObjectLocation::new("media", "in/clip.mp4");
        assert_eq!(S3Store::copy_source(&loc), "media/in/clip.mp4");
    }

    #[test]
    fn test_copy_source_escapes_key() {
        let loc = ObjectLocation::new("media", "in/summer trip/clip #1+é.mp4");
        assert_eq!(
            S3Store::copy_source(&loc),
            "media/in/summer%20trip/clip%20%231%2B%C3%A9.mp4"
        );

        let plain = ObjectLocation::new("media", "in/a-b_c.d~e.mp4");
        assert_eq!(S3Store::copy_source(&plain), "media/in/a-b_c.d~e.mp4");
    }

    #[tokio::test]
    async fn test_store_rejects_invalid_settings() {
        let settings = S3Settings {
            secret_key: Some("secret".to_string()),
            ..Default::default()
        };
        assert!(S3Store::new(&settings).await.is_err());
    }
}
