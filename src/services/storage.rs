//! S3-compatible object storage for generated images.

use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;

use crate::error::{Error, Result};

#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Stores the blob under `key` and returns the public URL it can be
    /// fetched from.
    async fn upload(&self, key: &str, content_type: &str, data: Vec<u8>) -> Result<String>;
}

/// Client for the Spaces bucket where generated images are kept for display
/// and archival
pub struct SpacesClient {
    client: Client,
    bucket: String,
    base_url: String,
}

impl SpacesClient {
    pub async fn new(
        access_key_id: &str,
        secret_key: &str,
        endpoint_origin: &str,
        region: &str,
        bucket: &str,
    ) -> Self {
        let credentials = Credentials::new(access_key_id, secret_key, None, None, "imagegen-service");
        let shared_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials)
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared_config)
            .endpoint_url(format!("https://{endpoint_origin}"))
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: bucket.to_string(),
            base_url: format!("https://{bucket}.{endpoint_origin}"),
        }
    }
}

#[async_trait]
impl StorageClient for SpacesClient {
    async fn upload(&self, key: &str, content_type: &str, data: Vec<u8>) -> Result<String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .acl(ObjectCannedAcl::PublicRead)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| Error::Storage(format!("failed to upload generated image: {e}")))?;

        Ok(format!("{}/{}", self.base_url, key))
    }
}
