//! Verification workflow
//!
//! Mixes cluster introspection with HTTP calls against the service the
//! deployment workflow exposed on the node. Each POST probe ships its JSON
//! payload from its own folder of the task-payload container.

use async_trait::async_trait;
use batchflow_core::domain::task::TaskSpec;
use batchflow_core::domain::workflow::WorkflowType;

use super::{Workflow, WorkflowContext, kubectl};
use crate::error::EngineError;

const ENV_DIR: &str = "Env";
const HELLO_DIR: &str = "Hello";

pub struct VerifyWorkflow {
    workflow_type: WorkflowType,
    context: WorkflowContext,
}

impl VerifyWorkflow {
    pub fn new(workflow_type: WorkflowType, context: WorkflowContext) -> Self {
        Self {
            workflow_type,
            context,
        }
    }

    fn post_json(&self, payload: &str) -> String {
        format!(
            "/bin/sh -c \"curl -X POST -s --header 'Content-Type: application/json' -d @./{} {}\"",
            payload, self.context.settings.tesk_endpoint
        )
    }

    async fn probe(&self, id: &str, folder: &str, file: &str) -> Result<TaskSpec, EngineError> {
        let payloads = self
            .context
            .locator
            .get_resource_files(&self.context.settings.tesk_tasks_container, folder)
            .await?;

        Ok(TaskSpec::new(id, self.post_json(&format!("{}/{}", folder, file)))
            .with_resource_files(payloads))
    }
}

#[async_trait]
impl Workflow for VerifyWorkflow {
    fn workflow_type(&self) -> &WorkflowType {
        &self.workflow_type
    }

    async fn produce_tasks(&self) -> Result<Vec<TaskSpec>, EngineError> {
        let status = format!(
            "/bin/sh -c \"curl -X GET -s --header 'Accept: application/json' {}\"",
            self.context.settings.tesk_endpoint
        );

        Ok(vec![
            TaskSpec::new("Get-Tesk-Pods", kubectl("get pods")),
            TaskSpec::new("Describe-Tesk-Pod", kubectl("describe pod")),
            self.probe("Print-Env-Vars", ENV_DIR, "env.json").await?,
            self.probe("Hello-Task", HELLO_DIR, "hello.json").await?,
            TaskSpec::new("Get-Tesk-Jobs", kubectl("get jobs")),
            TaskSpec::new("Get-Task-Status", status),
        ])
    }
}
