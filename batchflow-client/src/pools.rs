//! Pool and node image endpoints

use batchflow_core::domain::pool::{ImageInformation, Pool, PoolDescriptor};
use batchflow_core::dto::pool::{PoolAddParameter, PoolInfo};
use reqwest::Method;

use crate::error::Result;
use crate::{BatchClient, segment};

impl BatchClient {
    // =============================================================================
    // Pools
    // =============================================================================

    /// Create a pool
    ///
    /// Fails with `ClientError::AlreadyExists` (code `PoolExists`) when a
    /// pool with the same id is already present.
    pub async fn create_pool(&self, pool: &PoolDescriptor) -> Result<()> {
        let url = self.url("/pools");
        let response = self
            .request(Method::POST, &url)
            .await?
            .json(&PoolAddParameter::from(pool))
            .send()
            .await?;

        self.handle_empty_response(response).await
    }

    /// Get a pool by ID
    pub async fn get_pool(&self, pool_id: &str) -> Result<Pool> {
        let url = self.url(&format!("/pools/{}", segment(pool_id)));
        let response = self.request(Method::GET, &url).await?.send().await?;

        let info: PoolInfo = self.handle_response(response).await?;
        Ok(Pool::from(info))
    }

    /// Delete a pool and all of its nodes
    pub async fn delete_pool(&self, pool_id: &str) -> Result<()> {
        let url = self.url(&format!("/pools/{}", segment(pool_id)));
        let response = self.request(Method::DELETE, &url).await?.send().await?;

        self.handle_empty_response(response).await
    }

    // =============================================================================
    // Node images
    // =============================================================================

    /// List every VM image the service supports, with its node agent SKU
    pub async fn list_supported_images(&self) -> Result<Vec<ImageInformation>> {
        self.get_all_pages(self.url("/supportedimages")).await
    }
}
