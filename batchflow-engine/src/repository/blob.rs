//! Object store repository

use async_trait::async_trait;
use batchflow_client::{BlobClient, Result};
use std::time::Duration;

/// Repository trait for the blob object store
#[async_trait]
pub trait BlobRepository: Send + Sync {
    /// Generates a read URL for one object, valid for `ttl`
    fn signed_url(&self, container: &str, object_path: &str, ttl: Duration) -> Result<String>;

    /// Lists object names under a prefix in the store's natural order
    async fn list_objects(&self, container: &str, prefix: &str) -> Result<Vec<String>>;
}

#[async_trait]
impl BlobRepository for BlobClient {
    fn signed_url(&self, container: &str, object_path: &str, ttl: Duration) -> Result<String> {
        BlobClient::signed_url(self, container, object_path, ttl)
    }

    async fn list_objects(&self, container: &str, prefix: &str) -> Result<Vec<String>> {
        self.list_blobs(container, prefix).await
    }
}
