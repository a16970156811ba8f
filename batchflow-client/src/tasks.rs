//! Task endpoints

use batchflow_core::domain::task::{Task, TaskSpec};
use batchflow_core::dto::task::{
    MAX_TASKS_PER_COLLECTION, TaskAddCollectionParameter, TaskAddCollectionResult, TaskInfo,
};
use reqwest::Method;
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::{BatchClient, segment};

/// Name of a task's standard output file on its node
pub const STDOUT_FILE: &str = "stdout.txt";

/// Name of a task's standard error file on its node
pub const STDERR_FILE: &str = "stderr.txt";

impl BatchClient {
    /// List every task of a job
    pub async fn list_tasks(&self, job_id: &str) -> Result<Vec<Task>> {
        let url = self.url(&format!("/jobs/{}/tasks", segment(job_id)));
        let tasks: Vec<TaskInfo> = self.get_all_pages(url).await?;

        Ok(tasks.into_iter().map(Task::from).collect())
    }

    /// Add tasks to a job, preserving their order
    ///
    /// Batches larger than the service limit are sent in consecutive
    /// chunks. The first task the service rejects (duplicate id, bad
    /// command, ...) is returned as `ClientError::TaskRejected`.
    pub async fn add_tasks(&self, job_id: &str, tasks: &[TaskSpec]) -> Result<()> {
        let url = self.url(&format!("/jobs/{}/addtaskcollection", segment(job_id)));

        for chunk in tasks.chunks(MAX_TASKS_PER_COLLECTION) {
            debug!("Adding {} task(s) to job {}", chunk.len(), job_id);

            let response = self
                .request(Method::POST, &url)
                .await?
                .json(&TaskAddCollectionParameter { value: chunk })
                .send()
                .await?;

            let result: TaskAddCollectionResult = self.handle_response(response).await?;

            if let Some(rejected) = result.failures().next() {
                let (code, message) = match &rejected.error {
                    Some(error) => (
                        error.code.clone(),
                        error
                            .message_text()
                            .unwrap_or("no message from service")
                            .to_string(),
                    ),
                    None => (None, format!("status {:?}", rejected.status)),
                };
                return Err(ClientError::TaskRejected {
                    task_id: rejected.task_id.clone(),
                    code,
                    message,
                });
            }
        }

        Ok(())
    }

    /// Read a file from the node that ran a task, e.g. `stdout.txt`
    pub async fn get_task_file(&self, job_id: &str, task_id: &str, file_name: &str) -> Result<String> {
        let url = self.url(&format!(
            "/jobs/{}/tasks/{}/files/{}",
            segment(job_id),
            segment(task_id),
            segment(file_name)
        ));
        let response = self.request(Method::GET, &url).await?.send().await?;

        self.handle_text_response(response).await
    }
}
