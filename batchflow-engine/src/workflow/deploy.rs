//! Deployment workflow

use async_trait::async_trait;
use batchflow_core::domain::task::TaskSpec;
use batchflow_core::domain::workflow::WorkflowType;

use super::{Workflow, WorkflowContext, kubectl};
use crate::error::EngineError;

/// Folder of the k8s container holding the manifests
const MANIFEST_DIR: &str = "tesk";

/// Applies the manifests, then shows the service they expose
pub struct DeployWorkflow {
    workflow_type: WorkflowType,
    context: WorkflowContext,
}

impl DeployWorkflow {
    pub fn new(workflow_type: WorkflowType, context: WorkflowContext) -> Self {
        Self {
            workflow_type,
            context,
        }
    }
}

#[async_trait]
impl Workflow for DeployWorkflow {
    fn workflow_type(&self) -> &WorkflowType {
        &self.workflow_type
    }

    async fn produce_tasks(&self) -> Result<Vec<TaskSpec>, EngineError> {
        let manifests = self
            .context
            .locator
            .get_resource_files(&self.context.settings.k8s_container, MANIFEST_DIR)
            .await?;

        Ok(vec![
            TaskSpec::new("Deploy-TESK", kubectl(&format!("create -f ./{}", MANIFEST_DIR)))
                .with_resource_files(manifests),
            TaskSpec::new("Get-Service-IP", kubectl("get svc/tesk-api")),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::tests::context;
    use batchflow_core::domain::workflow::builtin;

    #[tokio::test]
    async fn test_deploy_attaches_manifests() {
        let workflow = DeployWorkflow::new(WorkflowType::new(builtin::TESK_DEPLOY), context());
        let tasks = workflow.produce_tasks().await.unwrap();

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, "Deploy-TESK");
        assert!(tasks[0].command_line.contains("create -f ./tesk"));

        let paths: Vec<_> = tasks[0]
            .resource_files
            .iter()
            .map(|f| f.file_path.as_str())
            .collect();
        assert_eq!(paths, vec!["tesk/namespace.yaml", "tesk/deployment.yaml"]);

        assert_eq!(tasks[1].id, "Get-Service-IP");
        assert!(tasks[1].resource_files.is_empty());
    }
}
