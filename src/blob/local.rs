//! Directory-backed blob store for dry runs and tests

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use super::{BlobError, BlobLocation, BlobResult, BlobStore};

/// Stores blobs under `root/<bucket>/<key>`
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path a location maps to
    pub fn path_for(&self, location: &BlobLocation) -> PathBuf {
        self.root
            .join(&location.bucket)
            .join(location.object_key())
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, local_path: &Path, location: &BlobLocation) -> BlobResult<()> {
        if !tokio::fs::try_exists(local_path).await? {
            return Err(BlobError::FileNotFound(local_path.to_path_buf()));
        }

        let target = self.path_for(location);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = tokio::fs::copy(local_path, &target).await?;

        info!(
            "Copied {} ({} bytes) to {}",
            local_path.display(),
            bytes,
            target.display()
        );
        Ok(())
    }

    fn store_type(&self) -> &'static str {
        "local"
    }
}
