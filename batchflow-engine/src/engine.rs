//! Orchestration engine
//!
//! Drives one linear session against the compute service:
//!
//! ```text
//! Idle → PoolEnsuring → JobEnsuring → TasksSubmitting → Polling
//!      → Collecting → (Cleanup) → Done
//! ```
//!
//! Any unrecoverable error moves the session to `Aborted`. Pool and job
//! creation tolerate an existing resource; every other remote failure
//! aborts the remaining steps but keeps what was already collected.

use batchflow_client::{STDERR_FILE, STDOUT_FILE};
use batchflow_core::domain::job::JobDescriptor;
use batchflow_core::domain::pool::{
    ContainerConfiguration, ContainerRegistry, ImageReference, PoolDescriptor, PoolStatus,
    UserAccount, VirtualMachineConfiguration,
};
use batchflow_core::domain::session::{
    SessionReport, SessionState, TeardownIssue, TeardownTarget,
};
use batchflow_core::domain::task::TaskOutcome;
use batchflow_core::domain::workflow::WorkflowType;
use secrecy::ExposeSecret;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EnvironmentConfig;
use crate::error::{EngineError, SessionFailure};
use crate::registry::WorkflowRegistry;
use crate::repository::ComputeRepository;
use crate::scheduler::{TaskMonitor, deadline_after};
use crate::service::{K8S_SINGLE_NODE, ResourceLocator, StartTaskFactory};
use crate::workflow::Workflow;

/// Linux uid/gid of the pool's user account
pub const POOL_USER_ID: u32 = 1075;

/// What the pool nodes are prepared to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// Single-node Kubernetes bootstrapped by the start task
    Kubernetes,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Kubernetes => "kubernetes",
        }
    }

    /// Container images prefetched onto every node
    pub fn container_images(&self) -> Vec<String> {
        match self {
            EngineKind::Kubernetes => Vec::new(),
        }
    }

    /// Application the pool start task runs
    pub fn start_application(&self) -> &'static str {
        match self {
            EngineKind::Kubernetes => K8S_SINGLE_NODE,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "kubernetes" | "k8s" => Ok(EngineKind::Kubernetes),
            _ => Err(EngineError::UnsupportedEngine(s.to_string())),
        }
    }
}

/// Parameters of one `execute_workflow` call
#[derive(Debug, Clone, Default)]
pub struct ExecutionRequest {
    pub job_id: String,
    pub pool_metadata: BTreeMap<String, String>,
    pub job_metadata: BTreeMap<String, String>,
    pub delete_pool_on_exit: bool,
    pub delete_job_on_exit: bool,
    /// Overrides the configured completion timeout
    pub timeout: Option<Duration>,
}

impl ExecutionRequest {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            ..Default::default()
        }
    }

    pub fn with_pool_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.pool_metadata = metadata;
        self
    }

    pub fn with_job_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.job_metadata = metadata;
        self
    }

    pub fn delete_pool_on_exit(mut self, delete: bool) -> Self {
        self.delete_pool_on_exit = delete;
        self
    }

    pub fn delete_job_on_exit(mut self, delete: bool) -> Self {
        self.delete_job_on_exit = delete;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// The top-level session driver
///
/// Workflows are added before execution; the active list is read-only
/// once `execute_workflow` runs.
pub struct WorkflowEngine {
    kind: EngineKind,
    pool_id: String,
    config: Arc<EnvironmentConfig>,
    registry: Arc<WorkflowRegistry>,
    compute: Arc<dyn ComputeRepository>,
    start_tasks: StartTaskFactory,
    monitor: TaskMonitor,
    workflows: Vec<Box<dyn Workflow>>,
    cancel: CancellationToken,
}

impl WorkflowEngine {
    /// Creates an engine bound to a pool
    ///
    /// # Arguments
    /// * `kind` - What the pool nodes are prepared to run
    /// * `pool_id` - Pool the session creates or reuses
    /// * `config` - Session configuration
    /// * `registry` - Resolves workflow types to producers
    /// * `compute` - The compute service
    /// * `locator` - Signs the start task's application download
    pub fn new(
        kind: EngineKind,
        pool_id: impl Into<String>,
        config: Arc<EnvironmentConfig>,
        registry: Arc<WorkflowRegistry>,
        compute: Arc<dyn ComputeRepository>,
        locator: Arc<ResourceLocator>,
    ) -> Self {
        let start_tasks = StartTaskFactory::new(locator, config.app_container.clone());
        Self {
            kind,
            pool_id: pool_id.into(),
            monitor: TaskMonitor::new(Arc::clone(&compute)),
            config,
            registry,
            compute,
            start_tasks,
            workflows: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    pub fn pool_id(&self) -> &str {
        &self.pool_id
    }

    /// Types of the active workflows, in the order they were added
    pub fn workflow_types(&self) -> Vec<&WorkflowType> {
        self.workflows.iter().map(|w| w.workflow_type()).collect()
    }

    /// Token that aborts a running completion barrier
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Appends a new producer for `workflow_type` to the active list
    ///
    /// The same type may be added more than once; each addition runs.
    pub fn add_workflow(&mut self, workflow_type: &WorkflowType) -> Result<(), EngineError> {
        let workflow = self.registry.get_workflow(workflow_type)?;
        info!("Added workflow {}", workflow_type);
        self.workflows.push(workflow);
        Ok(())
    }

    // =============================================================================
    // Pool and job
    // =============================================================================

    /// Builds the pool descriptor, resolving the node agent from the
    /// service's supported images
    pub async fn pool_descriptor(
        &self,
        metadata: BTreeMap<String, String>,
    ) -> Result<PoolDescriptor, EngineError> {
        let images = self
            .compute
            .list_supported_images()
            .await
            .map_err(|e| EngineError::remote("list supported images", e))?;

        let selector = &self.config.image_selector;
        let image = images
            .iter()
            .find(|image| selector.matches(image))
            .ok_or_else(|| EngineError::NoMatchingImage(selector.to_string()))?;
        debug!(
            "Node agent {} matches {}",
            image.node_agent_sku_id, selector
        );

        let prefetch = self.kind.container_images();
        let container_configuration = if prefetch.is_empty() {
            None
        } else {
            Some(ContainerConfiguration {
                image_names: prefetch,
                registries: vec![ContainerRegistry {
                    registry_server: self.config.registry.server.clone(),
                    user_name: self.config.registry.user.clone(),
                    password: self.config.registry.password.expose_secret().to_string(),
                }],
            })
        };

        let admin = &self.config.admin;
        let start_task = self
            .start_tasks
            .start_task(self.kind.start_application(), &admin.name)?;

        Ok(PoolDescriptor {
            pool_id: self.pool_id.clone(),
            vm_size: self.config.vm_size.clone(),
            dedicated_count: self.config.dedicated_node_count,
            low_priority_count: self.config.low_priority_node_count,
            vm_configuration: VirtualMachineConfiguration {
                image_reference: ImageReference::from_image_id(self.config.vm_image_id.clone()),
                node_agent_sku_id: image.node_agent_sku_id.clone(),
                container_configuration,
            },
            start_task: Some(start_task),
            user_account: Some(UserAccount {
                name: admin.name.clone(),
                password: admin.password.expose_secret().to_string(),
                elevation_level: admin.elevation_level,
                uid: Some(POOL_USER_ID),
                gid: Some(POOL_USER_ID),
            }),
            metadata,
        })
    }

    /// Creates the pool, or reads it back when it already exists
    ///
    /// Node counts are the pool's targets in both cases.
    pub async fn ensure_pool(
        &self,
        metadata: BTreeMap<String, String>,
    ) -> Result<PoolStatus, EngineError> {
        let descriptor = self.pool_descriptor(metadata).await?;

        match self.compute.create_pool(&descriptor).await {
            Ok(()) => {
                info!(
                    "Created pool {} ({} x {}, {} low-priority)",
                    descriptor.pool_id,
                    descriptor.dedicated_count,
                    descriptor.vm_size,
                    descriptor.low_priority_count
                );
                Ok(PoolStatus {
                    pool_id: descriptor.pool_id,
                    created: true,
                    dedicated_nodes: descriptor.dedicated_count,
                    low_priority_nodes: descriptor.low_priority_count,
                })
            }
            Err(e) if e.is_already_exists() => {
                let pool = self
                    .compute
                    .get_pool(&descriptor.pool_id)
                    .await
                    .map_err(|e| EngineError::remote("get pool", e))?;
                info!(
                    "Pool {} already exists: {} dedicated and {} low-priority node(s) running",
                    pool.id, pool.current_dedicated_nodes, pool.current_low_priority_nodes
                );
                Ok(PoolStatus {
                    pool_id: pool.id,
                    created: false,
                    dedicated_nodes: pool.target_dedicated_nodes,
                    low_priority_nodes: pool.target_low_priority_nodes,
                })
            }
            Err(e) => Err(EngineError::remote("create pool", e)),
        }
    }

    /// Creates the job on the pool; returns `false` when it already existed
    pub async fn ensure_job(
        &self,
        job_id: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<bool, EngineError> {
        let job = JobDescriptor::new(job_id, self.pool_id.clone()).with_metadata(metadata);

        match self.compute.create_job(&job).await {
            Ok(()) => {
                info!("Created job {} on pool {}", job_id, self.pool_id);
                Ok(true)
            }
            Err(e) if e.is_already_exists() => {
                info!("Job {} already exists", job_id);
                Ok(false)
            }
            Err(e) => Err(EngineError::remote("create job", e)),
        }
    }

    // =============================================================================
    // Session
    // =============================================================================

    /// Runs one session
    ///
    /// On abort the returned `SessionFailure` carries every result
    /// collected before the failing step.
    pub async fn execute_workflow(
        &self,
        request: &ExecutionRequest,
    ) -> Result<SessionReport, SessionFailure> {
        let mut report = SessionReport::new(request.job_id.clone(), self.pool_id.clone());

        match self.run_session(request, &mut report).await {
            Ok(()) => Ok(report),
            Err(error) => {
                warn!(
                    "Session for job {} aborted during {}: {}",
                    request.job_id, report.state, error
                );
                report.state = SessionState::Aborted;
                Err(SessionFailure::new(error, report))
            }
        }
    }

    async fn run_session(
        &self,
        request: &ExecutionRequest,
        report: &mut SessionReport,
    ) -> Result<(), EngineError> {
        if self.workflows.is_empty() {
            return Err(EngineError::Configuration(
                "no workflows were added to the engine".to_string(),
            ));
        }
        let timeout = request.timeout.unwrap_or(self.config.job_timeout);
        deadline_after(timeout)?;

        transition(report, SessionState::PoolEnsuring);
        report.pool = Some(self.ensure_pool(request.pool_metadata.clone()).await?);

        transition(report, SessionState::JobEnsuring);
        report.job_created = Some(
            self.ensure_job(&request.job_id, request.job_metadata.clone())
                .await?,
        );

        transition(report, SessionState::TasksSubmitting);
        for workflow in &self.workflows {
            let tasks = workflow.produce_tasks().await?;
            info!(
                "Submitting {} task(s) of workflow {} to job {}",
                tasks.len(),
                workflow.workflow_type(),
                request.job_id
            );
            self.compute
                .add_tasks(&request.job_id, &tasks)
                .await
                .map_err(|e| EngineError::remote("add tasks", e))?;
            report.submitted.extend(tasks.into_iter().map(|t| t.id));
        }

        transition(report, SessionState::Polling);
        let tasks = self
            .monitor
            .wait_all_terminal(
                &request.job_id,
                timeout,
                self.config.poll_interval,
                &self.cancel,
            )
            .await?;

        transition(report, SessionState::Collecting);
        for task in tasks {
            let stdout = self.task_file(&request.job_id, &task.id, STDOUT_FILE).await?;
            let stderr = self.task_file(&request.job_id, &task.id, STDERR_FILE).await?;
            report.tasks.push(TaskOutcome::from_task(task, stdout, stderr));
        }

        if request.delete_job_on_exit || request.delete_pool_on_exit {
            transition(report, SessionState::Cleanup);
            self.teardown(request, report).await;
        }

        transition(report, SessionState::Done);
        Ok(())
    }

    async fn task_file(&self, job_id: &str, task_id: &str, file: &str) -> Result<String, EngineError> {
        self.compute
            .get_task_file(job_id, task_id, file)
            .await
            .map_err(|e| EngineError::remote("read task output", e))
    }

    /// Best-effort deletes; failures are recorded, never raised
    async fn teardown(&self, request: &ExecutionRequest, report: &mut SessionReport) {
        if request.delete_job_on_exit {
            match self.compute.delete_job(&request.job_id).await {
                Ok(()) => info!("Deleted job {}", request.job_id),
                Err(e) => {
                    warn!("Failed to delete job {}: {}", request.job_id, e);
                    report.teardown.push(TeardownIssue {
                        target: TeardownTarget::Job,
                        id: request.job_id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if request.delete_pool_on_exit {
            match self.compute.delete_pool(&self.pool_id).await {
                Ok(()) => info!("Deleted pool {}", self.pool_id),
                Err(e) => {
                    warn!("Failed to delete pool {}: {}", self.pool_id, e);
                    report.teardown.push(TeardownIssue {
                        target: TeardownTarget::Pool,
                        id: self.pool_id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}

fn transition(report: &mut SessionReport, next: SessionState) {
    debug!(
        "Session {}: {} -> {}",
        report.job_id, report.state, next
    );
    report.state = next;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_kind_parsing() {
        assert_eq!("kubernetes".parse::<EngineKind>().unwrap(), EngineKind::Kubernetes);
        assert_eq!("K8S".parse::<EngineKind>().unwrap(), EngineKind::Kubernetes);

        let err = "spark".parse::<EngineKind>().unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedEngine(name) if name == "spark"));
    }

    #[test]
    fn test_kubernetes_kind() {
        let kind = EngineKind::Kubernetes;
        assert!(kind.container_images().is_empty());
        assert_eq!(kind.start_application(), "k8s-single-node.sh");
        assert_eq!(kind.to_string(), "kubernetes");
    }

    #[test]
    fn test_execution_request_builder() {
        let request = ExecutionRequest::new("job-1")
            .with_job_metadata(BTreeMap::from([("owner".to_string(), "lab".to_string())]))
            .delete_job_on_exit(true)
            .with_timeout(Duration::from_secs(30));

        assert_eq!(request.job_id, "job-1");
        assert!(request.delete_job_on_exit);
        assert!(!request.delete_pool_on_exit);
        assert!(request.pool_metadata.is_empty());
        assert_eq!(request.job_metadata["owner"], "lab");
        assert_eq!(request.timeout, Some(Duration::from_secs(30)));
    }
}
