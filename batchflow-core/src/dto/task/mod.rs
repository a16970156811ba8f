//! Task DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::task::{ExecutionResult, FailureInfo, Task, TaskSpec, TaskState};
use crate::dto::common::BatchErrorBody;

/// Maximum number of tasks the service accepts in one add-collection call
pub const MAX_TASKS_PER_COLLECTION: usize = 100;

/// Body of `POST /jobs/{id}/addtaskcollection`
#[derive(Debug, Clone, Serialize)]
pub struct TaskAddCollectionParameter<'a> {
    pub value: &'a [TaskSpec],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskAddStatus {
    Success,
    ClientError,
    ServerError,
}

/// Per-task entry of the add-collection response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAddResult {
    pub status: TaskAddStatus,
    pub task_id: String,
    #[serde(default)]
    pub error: Option<BatchErrorBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAddCollectionResult {
    #[serde(default)]
    pub value: Vec<TaskAddResult>,
}

impl TaskAddCollectionResult {
    /// Entries the service did not accept
    pub fn failures(&self) -> impl Iterator<Item = &TaskAddResult> {
        self.value
            .iter()
            .filter(|r| r.status != TaskAddStatus::Success)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskExecutionInfo {
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub result: Option<ExecutionResult>,
    #[serde(default)]
    pub failure_info: Option<FailureInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeNodeInformation {
    #[serde(default)]
    pub node_id: Option<String>,
}

/// Task entry of `GET /jobs/{id}/tasks`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub id: String,
    #[serde(default)]
    pub command_line: String,
    pub state: TaskState,
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub execution_info: Option<TaskExecutionInfo>,
    #[serde(default)]
    pub node_info: Option<ComputeNodeInformation>,
}

impl From<TaskInfo> for Task {
    fn from(info: TaskInfo) -> Self {
        let (exit_code, result, failure) = match info.execution_info {
            Some(exec) => (exec.exit_code, exec.result, exec.failure_info),
            None => (None, None, None),
        };

        Self {
            id: info.id,
            command_line: info.command_line,
            state: info.state,
            node_id: info.node_info.and_then(|n| n.node_id),
            exit_code,
            result,
            failure,
            creation_time: info.creation_time,
        }
    }
}
