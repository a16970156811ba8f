//! Compute service repository
//!
//! The capability set the engine consumes from the cluster-compute
//! service: pools, jobs, tasks, task output files and node images.

use async_trait::async_trait;
use batchflow_client::{BatchClient, Result};
use batchflow_core::domain::job::JobDescriptor;
use batchflow_core::domain::pool::{ImageInformation, Pool, PoolDescriptor};
use batchflow_core::domain::task::{Task, TaskSpec};

/// Repository trait for the compute service
///
/// Create calls must report an existing resource as
/// `ClientError::AlreadyExists`, distinct from every other failure.
#[async_trait]
pub trait ComputeRepository: Send + Sync {
    /// Creates a pool
    async fn create_pool(&self, pool: &PoolDescriptor) -> Result<()>;

    /// Reads a pool
    async fn get_pool(&self, pool_id: &str) -> Result<Pool>;

    /// Deletes a pool
    async fn delete_pool(&self, pool_id: &str) -> Result<()>;

    /// Creates a job bound to its pool
    async fn create_job(&self, job: &JobDescriptor) -> Result<()>;

    /// Deletes a job
    async fn delete_job(&self, job_id: &str) -> Result<()>;

    /// Lists every task of a job with its current state
    async fn list_tasks(&self, job_id: &str) -> Result<Vec<Task>>;

    /// Adds a batch of tasks to a job, in order
    async fn add_tasks(&self, job_id: &str, tasks: &[TaskSpec]) -> Result<()>;

    /// Reads an output file (`stdout.txt`, `stderr.txt`) of a task
    async fn get_task_file(&self, job_id: &str, task_id: &str, file_name: &str) -> Result<String>;

    /// Lists the node images the service supports
    async fn list_supported_images(&self) -> Result<Vec<ImageInformation>>;
}

#[async_trait]
impl ComputeRepository for BatchClient {
    async fn create_pool(&self, pool: &PoolDescriptor) -> Result<()> {
        BatchClient::create_pool(self, pool).await
    }

    async fn get_pool(&self, pool_id: &str) -> Result<Pool> {
        BatchClient::get_pool(self, pool_id).await
    }

    async fn delete_pool(&self, pool_id: &str) -> Result<()> {
        BatchClient::delete_pool(self, pool_id).await
    }

    async fn create_job(&self, job: &JobDescriptor) -> Result<()> {
        BatchClient::create_job(self, job).await
    }

    async fn delete_job(&self, job_id: &str) -> Result<()> {
        BatchClient::delete_job(self, job_id).await
    }

    async fn list_tasks(&self, job_id: &str) -> Result<Vec<Task>> {
        BatchClient::list_tasks(self, job_id).await
    }

    async fn add_tasks(&self, job_id: &str, tasks: &[TaskSpec]) -> Result<()> {
        BatchClient::add_tasks(self, job_id, tasks).await
    }

    async fn get_task_file(&self, job_id: &str, task_id: &str, file_name: &str) -> Result<String> {
        BatchClient::get_task_file(self, job_id, task_id, file_name).await
    }

    async fn list_supported_images(&self) -> Result<Vec<ImageInformation>> {
        BatchClient::list_supported_images(self).await
    }
}
