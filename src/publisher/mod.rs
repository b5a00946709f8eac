use anyhow::Context;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub mod s3;

pub use s3::S3Store;

use crate::Result;

/// Durable storage that hands back a public link for every upload
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the file's bytes under `key` and return the link to it
    async fn upload(&self, key: &str, body: tokio::fs::File) -> Result<String>;
}

/// Uploads local artifacts and reports their links
pub struct Publisher {
    store: Arc<dyn ObjectStore>,
    key_prefix: String,
}

impl Publisher {
    pub fn new(store: Arc<dyn ObjectStore>, key_prefix: Option<String>) -> Self {
        Self {
            store,
            key_prefix: key_prefix.unwrap_or_default(),
        }
    }

    /// Upload `path` as `filename`; the store's link is returned unchanged
    pub async fn publish(&self, path: &Path, filename: &str) -> Result<String> {
        let result = self.upload(path, filename).await;
        if let Err(e) = &result {
            tracing::error!("Error occurred while downloading file or upload file: {:#}", e);
        }

        result.context("error occurred while downloading file or upload file")
    }

    async fn upload(&self, path: &Path, filename: &str) -> Result<String> {
        // The handle moves into the upload and is closed whichever way it returns
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let key = format!("{}{}", self.key_prefix, filename);
        tracing::info!("Uploading {} as {}", path.display(), key);

        self.store.upload(&key, file).await
    }
}
