//! Resource locator
//!
//! Turns blob names into `ResourceFile`s: a signed, time-bounded URL a
//! compute node can download from, plus the path the file lands at in the
//! task's working directory.

use batchflow_core::domain::task::ResourceFile;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::EngineError;
use crate::repository::BlobRepository;

/// Signed URLs stay valid for one hour unless configured otherwise
pub const DEFAULT_SAS_TTL: Duration = Duration::from_secs(3600);

pub struct ResourceLocator {
    store: Arc<dyn BlobRepository>,
    ttl: Duration,
}

impl ResourceLocator {
    pub fn new(store: Arc<dyn BlobRepository>) -> Self {
        Self::with_ttl(store, DEFAULT_SAS_TTL)
    }

    pub fn with_ttl(store: Arc<dyn BlobRepository>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Locates one object
    ///
    /// `path_prefix` is prepended verbatim to `blob_name` and must carry its
    /// own trailing `/` when it names a folder. The result is stored at the
    /// same relative path on the node.
    pub fn get_resource_file(
        &self,
        container: &str,
        blob_name: &str,
        path_prefix: &str,
    ) -> Result<ResourceFile, EngineError> {
        let path = format!("{}{}", path_prefix, blob_name);
        let url = self
            .store
            .signed_url(container, &path, self.ttl)
            .map_err(|e| EngineError::remote("sign object url", e))?;

        Ok(ResourceFile::new(url, path))
    }

    /// Locates every object under `folder_prefix`
    ///
    /// Keeps the store's listing order. A prefix matching nothing yields an
    /// empty list.
    pub async fn get_resource_files(
        &self,
        container: &str,
        folder_prefix: &str,
    ) -> Result<Vec<ResourceFile>, EngineError> {
        let names = self
            .store
            .list_objects(container, folder_prefix)
            .await
            .map_err(|e| EngineError::remote("list objects", e))?;

        debug!(
            "Resolved {} object(s) under {}/{}",
            names.len(),
            container,
            folder_prefix
        );

        names
            .iter()
            .map(|name| self.get_resource_file(container, name, ""))
            .collect()
    }
}
