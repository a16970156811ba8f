//! Task domain types
//!
//! `TaskSpec` is what a workflow produces and the engine submits. `Task` is
//! what the engine observes while polling. State transitions belong to the
//! compute service; the engine never forces one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A file the compute node downloads before running a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceFile {
    /// Signed, time-bounded URL of the object
    pub http_url: String,
    /// Destination path relative to the task's working directory
    pub file_path: String,
}

impl ResourceFile {
    pub fn new(http_url: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            http_url: http_url.into(),
            file_path: file_path.into(),
        }
    }
}

/// Run the task's command inside a container instead of on the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSettings {
    pub image_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_run_options: Option<String>,
}

/// Specification of one task to submit to a job
///
/// `id` must be unique across every task ever submitted to the same job;
/// the compute service rejects collisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    pub id: String,
    pub command_line: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_files: Vec<ResourceFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_settings: Option<ContainerSettings>,
}

impl TaskSpec {
    pub fn new(id: impl Into<String>, command_line: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command_line: command_line.into(),
            resource_files: Vec::new(),
            container_settings: None,
        }
    }

    pub fn with_resource_files(mut self, files: Vec<ResourceFile>) -> Self {
        self.resource_files = files;
        self
    }

    pub fn with_container_settings(mut self, settings: ContainerSettings) -> Self {
        self.container_settings = Some(settings);
        self
    }
}

/// Task lifecycle state as reported by the compute service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Active,
    Preparing,
    Running,
    Completed,
}

impl TaskState {
    /// Only `Completed` is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed)
    }
}

/// Outcome of a completed task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionResult {
    Success,
    Failure,
}

/// Name/value pair attached to failures and metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameValue {
    pub name: String,
    pub value: String,
}

/// Structured failure reported for a task, surfaced verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureInfo {
    /// `userError` or `serverError`
    pub category: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Vec<NameValue>,
}

/// A task as observed on the compute service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub command_line: String,
    pub state: TaskState,
    /// Compute node that ran (or is running) the task
    pub node_id: Option<String>,
    pub exit_code: Option<i32>,
    pub result: Option<ExecutionResult>,
    pub failure: Option<FailureInfo>,
    pub creation_time: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn failed(&self) -> bool {
        self.result == Some(ExecutionResult::Failure)
    }
}

/// Last observed state of one task, kept when the completion barrier trips
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: String,
    pub state: TaskState,
}

impl From<&Task> for TaskSnapshot {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            state: task.state,
        }
    }
}

/// Collected result of one terminal task
///
/// Produced for every task of the job, successful or not. A task that
/// reported `Failure` is not fatal to the session; its `failure` is carried
/// here alongside its output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub id: String,
    pub command_line: String,
    pub node_id: Option<String>,
    pub state: TaskState,
    pub result: Option<ExecutionResult>,
    pub exit_code: Option<i32>,
    pub failure: Option<FailureInfo>,
    pub stdout: String,
    pub stderr: String,
}

impl TaskOutcome {
    pub fn from_task(task: Task, stdout: String, stderr: String) -> Self {
        Self {
            id: task.id,
            command_line: task.command_line,
            node_id: task.node_id,
            state: task.state,
            result: task.result,
            exit_code: task.exit_code,
            failure: task.failure,
            stdout,
            stderr,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.result == Some(ExecutionResult::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_completed_is_terminal() {
        assert!(TaskState::Completed.is_terminal());
        assert!(!TaskState::Active.is_terminal());
        assert!(!TaskState::Preparing.is_terminal());
        assert!(!TaskState::Running.is_terminal());
    }

    #[test]
    fn test_task_spec_omits_empty_fields_on_the_wire() {
        let spec = TaskSpec::new("Get-cluster-info", "/bin/sh -c \"kubectl cluster-info\"");
        let json = serde_json::to_value(&spec).unwrap();

        assert_eq!(json["id"], "Get-cluster-info");
        assert_eq!(json["commandLine"], "/bin/sh -c \"kubectl cluster-info\"");
        assert!(json.get("resourceFiles").is_none());
        assert!(json.get("containerSettings").is_none());
    }

    #[test]
    fn test_resource_files_use_service_field_names() {
        let spec = TaskSpec::new("Deploy-TESK", "create").with_resource_files(vec![
            ResourceFile::new("https://acct.blob/x?sig=1", "tesk/a.yaml"),
        ]);
        let json = serde_json::to_value(&spec).unwrap();

        assert_eq!(json["resourceFiles"][0]["httpUrl"], "https://acct.blob/x?sig=1");
        assert_eq!(json["resourceFiles"][0]["filePath"], "tesk/a.yaml");
    }

    #[test]
    fn test_outcome_success_follows_result() {
        let task = Task {
            id: "t".to_string(),
            command_line: "true".to_string(),
            state: TaskState::Completed,
            node_id: Some("node-1".to_string()),
            exit_code: Some(1),
            result: Some(ExecutionResult::Failure),
            failure: None,
            creation_time: None,
        };
        assert!(task.failed());

        let outcome = TaskOutcome::from_task(task, String::new(), "boom".to_string());
        assert!(!outcome.succeeded());
        assert_eq!(outcome.node_id.as_deref(), Some("node-1"));
    }
}
