//! Job endpoints

use batchflow_core::domain::job::JobDescriptor;
use batchflow_core::dto::job::JobAddParameter;
use reqwest::Method;

use crate::error::Result;
use crate::{BatchClient, segment};

impl BatchClient {
    /// Create a job bound to a pool
    ///
    /// Fails with `ClientError::AlreadyExists` (code `JobExists`) when a
    /// job with the same id is already present.
    pub async fn create_job(&self, job: &JobDescriptor) -> Result<()> {
        let url = self.url("/jobs");
        let response = self
            .request(Method::POST, &url)
            .await?
            .json(&JobAddParameter::from(job))
            .send()
            .await?;

        self.handle_empty_response(response).await
    }

    /// Delete a job and its tasks
    pub async fn delete_job(&self, job_id: &str) -> Result<()> {
        let url = self.url(&format!("/jobs/{}", segment(job_id)));
        let response = self.request(Method::DELETE, &url).await?.send().await?;

        self.handle_empty_response(response).await
    }
}
