//! Workflows
//!
//! A workflow is a task-list producer: it decides *what* runs on the pool
//! and returns an ordered list of task specifications. Submitting,
//! scheduling and waiting are the engine's job.
//!
//! Three workflows are built in:
//!
//! - [`ClusterInfoWorkflow`]: diagnostic queries against the node's cluster
//! - [`DeployWorkflow`]: applies the deployment manifests, then inspects
//!   the exposed service
//! - [`VerifyWorkflow`]: probes the deployed service over HTTP

mod cluster_info;
mod deploy;
mod verify;

pub use cluster_info::ClusterInfoWorkflow;
pub use deploy::DeployWorkflow;
pub use verify::VerifyWorkflow;

use async_trait::async_trait;
use batchflow_core::domain::task::TaskSpec;
use batchflow_core::domain::workflow::WorkflowType;
use std::sync::Arc;

use crate::config::EnvironmentConfig;
use crate::error::EngineError;
use crate::service::ResourceLocator;

/// A task-list producer
///
/// `produce_tasks` must not submit anything. Task ids are unique within
/// one producer's output.
#[async_trait]
pub trait Workflow: Send + Sync {
    /// The type this instance was created for
    fn workflow_type(&self) -> &WorkflowType;

    /// Returns the tasks to run, in submission order
    async fn produce_tasks(&self) -> Result<Vec<TaskSpec>, EngineError>;
}

/// Where the workflows find their artifacts and the service they probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSettings {
    /// Container holding the deployment manifests
    pub k8s_container: String,
    /// Container holding the verification task payloads
    pub tesk_tasks_container: String,
    /// Service endpoint as seen from the node
    pub tesk_endpoint: String,
}

impl WorkflowSettings {
    pub fn from_config(config: &EnvironmentConfig) -> Self {
        Self {
            k8s_container: config.k8s_container.clone(),
            tesk_tasks_container: config.tesk_tasks_container.clone(),
            tesk_endpoint: config.tesk_endpoint.clone(),
        }
    }
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            k8s_container: "k8s".to_string(),
            tesk_tasks_container: "tesk-tasks".to_string(),
            tesk_endpoint: "http://127.0.0.1:31882/v1/tasks".to_string(),
        }
    }
}

/// Shared dependencies handed to every workflow constructor
#[derive(Clone)]
pub struct WorkflowContext {
    pub locator: Arc<ResourceLocator>,
    pub settings: Arc<WorkflowSettings>,
}

impl WorkflowContext {
    pub fn new(locator: Arc<ResourceLocator>, settings: WorkflowSettings) -> Self {
        Self {
            locator,
            settings: Arc::new(settings),
        }
    }
}

/// The closed set of built-in workflow implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowKind {
    ClusterInfo,
    Deploy,
    Verify,
}

impl WorkflowKind {
    /// Creates a fresh producer of this kind for `workflow_type`
    pub fn instantiate(
        self,
        workflow_type: WorkflowType,
        context: &WorkflowContext,
    ) -> Box<dyn Workflow> {
        match self {
            WorkflowKind::ClusterInfo => Box::new(ClusterInfoWorkflow::new(workflow_type)),
            WorkflowKind::Deploy => Box::new(DeployWorkflow::new(workflow_type, context.clone())),
            WorkflowKind::Verify => Box::new(VerifyWorkflow::new(workflow_type, context.clone())),
        }
    }
}

/// Runs `kubectl` on the node against the kubeconfig the start task wrote
pub(crate) fn kubectl(args: &str) -> String {
    format!(
        "/bin/sh -c \"kubectl --kubeconfig=$AZ_BATCH_NODE_STARTUP_DIR/config {}\"",
        args
    )
}
