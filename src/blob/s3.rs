//! S3 blob store

use std::path::Path;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use tracing::info;

use super::{BlobError, BlobLocation, BlobResult, BlobStore};

/// Uploads extracts with `PutObject`
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
}

impl S3BlobStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build from a shared SDK configuration
    pub fn from_conf(config: &SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn upload(&self, local_path: &Path, location: &BlobLocation) -> BlobResult<()> {
        if !tokio::fs::try_exists(local_path).await? {
            return Err(BlobError::FileNotFound(local_path.to_path_buf()));
        }

        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| BlobError::UploadFailed {
                location: location.uri(),
                message: e.to_string(),
            })?;

        self.client
            .put_object()
            .bucket(&location.bucket)
            .key(location.object_key())
            .body(body)
            .send()
            .await
            .map_err(|e| BlobError::UploadFailed {
                location: location.uri(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        info!("Uploaded {} to {}", local_path.display(), location);
        Ok(())
    }

    fn store_type(&self) -> &'static str {
        "s3"
    }
}
