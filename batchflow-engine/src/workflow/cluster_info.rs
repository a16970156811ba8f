//! Cluster inspection workflow

use async_trait::async_trait;
use batchflow_core::domain::task::TaskSpec;
use batchflow_core::domain::workflow::WorkflowType;

use super::{Workflow, kubectl};
use crate::error::EngineError;

/// Fixed diagnostic queries; needs no artifacts
pub struct ClusterInfoWorkflow {
    workflow_type: WorkflowType,
}

impl ClusterInfoWorkflow {
    pub fn new(workflow_type: WorkflowType) -> Self {
        Self { workflow_type }
    }
}

#[async_trait]
impl Workflow for ClusterInfoWorkflow {
    fn workflow_type(&self) -> &WorkflowType {
        &self.workflow_type
    }

    async fn produce_tasks(&self) -> Result<Vec<TaskSpec>, EngineError> {
        Ok(vec![
            TaskSpec::new("Get-cluster-info", kubectl("cluster-info")),
            TaskSpec::new("Get-version-info", kubectl("version")),
            TaskSpec::new("Get-all-pods", kubectl("get pods --all-namespaces")),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchflow_core::domain::workflow::builtin;

    #[tokio::test]
    async fn test_cluster_info_tasks() {
        let workflow = ClusterInfoWorkflow::new(WorkflowType::new(builtin::K8S_DETAILS));
        let tasks = workflow.produce_tasks().await.unwrap();

        let ids: Vec<_> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["Get-cluster-info", "Get-version-info", "Get-all-pods"]);
        assert!(tasks.iter().all(|t| t.resource_files.is_empty()));
        assert!(tasks[2].command_line.contains("get pods --all-namespaces"));
    }
}
