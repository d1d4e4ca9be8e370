//! Blob storage for the serialized extract
//!
//! The extract is written locally and then handed to a [`BlobStore`]. The
//! warehouse loads it from the same [`BlobLocation`].

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod local;
#[cfg(feature = "aws")]
pub mod s3;

pub use local::LocalBlobStore;
#[cfg(feature = "aws")]
pub use s3::S3BlobStore;

/// Error type for blob storage operations
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("Local file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Upload to {location} failed: {message}")]
    UploadFailed { location: String, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for blob storage operations
pub type BlobResult<T> = Result<T, BlobError>;

/// Bucket and object key of a stored blob
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobLocation {
    pub bucket: String,
    pub key: String,
}

impl BlobLocation {
    /// Build a location; a leading `/` on the key is dropped
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            bucket: bucket.into(),
            key: key.trim_start_matches('/').to_string(),
        }
    }

    /// Object key as written to and read from the store
    pub fn object_key(&self) -> &str {
        self.key.trim_start_matches('/')
    }

    /// `s3://bucket/key`
    pub fn uri(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.object_key())
    }
}

impl fmt::Display for BlobLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

/// Destination for uploaded files
///
/// The store does not manage bucket lifecycle; the bucket must exist.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload a local file, replacing any object at the location
    async fn upload(&self, local_path: &Path, location: &BlobLocation) -> BlobResult<()>;

    /// Get the store type name
    fn store_type(&self) -> &'static str;
}
