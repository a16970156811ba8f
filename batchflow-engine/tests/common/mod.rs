//! Common test utilities for engine integration tests.

use async_trait::async_trait;
use batchflow_client::{BlobClient, ClientError, Result};
use batchflow_core::domain::job::JobDescriptor;
use batchflow_core::domain::pool::{ImageInformation, ImageReference, Pool, PoolDescriptor};
use batchflow_core::domain::task::{
    ExecutionResult, FailureInfo, NameValue, Task, TaskSpec, TaskState,
};
use batchflow_core::dto::common::codes;
use batchflow_engine::{
    BlobRepository, ComputeRepository, EngineKind, EnvironmentConfig, ResourceLocator,
    WorkflowContext, WorkflowEngine, WorkflowRegistry, WorkflowSettings,
};
use secrecy::SecretString;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const POOL_ID: &str = "TES-BATCH-POOL-01";

/// base64("key")
const STORAGE_KEY: &str = "a2V5";

/// One call made against the fake compute service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListSupportedImages,
    CreatePool(String),
    GetPool(String),
    DeletePool(String),
    CreateJob(String),
    DeleteJob(String),
    ListTasks(String),
    AddTasks(String, Vec<String>),
    GetTaskFile(String, String),
}

/// How submitted tasks behave on the fake service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskBehaviour {
    /// Every task is completed successfully as soon as it is added
    CompleteImmediately,
    /// Tasks stay running forever
    NeverFinish,
    /// Every task completes at once; the named task reports `failure()`
    FailTask(&'static str),
}

/// Failure the fake service reports for a task under `FailTask`
pub fn failure() -> FailureInfo {
    FailureInfo {
        category: "userError".to_string(),
        code: Some("FailureExitCode".to_string()),
        message: Some("The task exited with an exit code representing a failure".to_string()),
        details: vec![NameValue {
            name: "Message".to_string(),
            value: "The task exited with exit code 1".to_string(),
        }],
    }
}

#[derive(Default)]
struct ComputeState {
    calls: Vec<Call>,
    pools: HashMap<String, PoolDescriptor>,
    jobs: HashMap<String, JobDescriptor>,
    tasks: HashMap<String, Vec<Task>>,
}

/// In-memory compute service
pub struct FakeCompute {
    behaviour: TaskBehaviour,
    images: Vec<ImageInformation>,
    fail_delete_pool: bool,
    fail_output_for: Option<String>,
    state: Mutex<ComputeState>,
}

impl FakeCompute {
    pub fn new(behaviour: TaskBehaviour) -> Self {
        Self {
            behaviour,
            images: vec![
                image("microsoftwindowsserver", "windowsserver", "2019-datacenter"),
                image("canonical", "ubuntuserver", "18.04-lts"),
            ],
            fail_delete_pool: false,
            fail_output_for: None,
            state: Mutex::new(ComputeState::default()),
        }
    }

    pub fn without_images(mut self) -> Self {
        self.images.clear();
        self
    }

    pub fn failing_pool_delete(mut self) -> Self {
        self.fail_delete_pool = true;
        self
    }

    /// Reading any output file of `task_id` fails
    pub fn failing_output_for(mut self, task_id: &str) -> Self {
        self.fail_output_for = Some(task_id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn has_pool(&self, pool_id: &str) -> bool {
        self.state.lock().unwrap().pools.contains_key(pool_id)
    }

    pub fn has_job(&self, job_id: &str) -> bool {
        self.state.lock().unwrap().jobs.contains_key(job_id)
    }

    pub fn pool(&self, pool_id: &str) -> Option<PoolDescriptor> {
        self.state.lock().unwrap().pools.get(pool_id).cloned()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

fn image(publisher: &str, offer: &str, sku: &str) -> ImageInformation {
    ImageInformation {
        node_agent_sku_id: format!("batch.node.{}", offer),
        image_reference: ImageReference::marketplace(publisher, offer, sku, "latest"),
        os_type: None,
        verification_type: None,
    }
}

fn exists(code: &str) -> ClientError {
    ClientError::AlreadyExists {
        code: code.to_string(),
        message: "The specified resource already exists.".to_string(),
    }
}

fn not_found(what: &str) -> ClientError {
    ClientError::api_error(404, Some(format!("{}NotFound", what)), "not found")
}

#[async_trait]
impl ComputeRepository for FakeCompute {
    async fn create_pool(&self, pool: &PoolDescriptor) -> Result<()> {
        self.record(Call::CreatePool(pool.pool_id.clone()));
        let mut state = self.state.lock().unwrap();
        if state.pools.contains_key(&pool.pool_id) {
            return Err(exists(codes::POOL_EXISTS));
        }
        state.pools.insert(pool.pool_id.clone(), pool.clone());
        Ok(())
    }

    async fn get_pool(&self, pool_id: &str) -> Result<Pool> {
        self.record(Call::GetPool(pool_id.to_string()));
        let state = self.state.lock().unwrap();
        let pool = state.pools.get(pool_id).ok_or_else(|| not_found("Pool"))?;
        Ok(Pool {
            id: pool.pool_id.clone(),
            vm_size: Some(pool.vm_size.clone()),
            state: Some("active".to_string()),
            current_dedicated_nodes: 0,
            current_low_priority_nodes: 0,
            target_dedicated_nodes: pool.dedicated_count,
            target_low_priority_nodes: pool.low_priority_count,
            metadata: pool.metadata.clone(),
        })
    }

    async fn delete_pool(&self, pool_id: &str) -> Result<()> {
        self.record(Call::DeletePool(pool_id.to_string()));
        if self.fail_delete_pool {
            return Err(ClientError::api_error(
                409,
                Some("PoolBeingResized".to_string()),
                "pool is resizing",
            ));
        }
        let mut state = self.state.lock().unwrap();
        state.pools.remove(pool_id).map(|_| ()).ok_or_else(|| not_found("Pool"))
    }

    async fn create_job(&self, job: &JobDescriptor) -> Result<()> {
        self.record(Call::CreateJob(job.job_id.clone()));
        let mut state = self.state.lock().unwrap();
        if state.jobs.contains_key(&job.job_id) {
            return Err(exists(codes::JOB_EXISTS));
        }
        state.jobs.insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    async fn delete_job(&self, job_id: &str) -> Result<()> {
        self.record(Call::DeleteJob(job_id.to_string()));
        let mut state = self.state.lock().unwrap();
        state.tasks.remove(job_id);
        state.jobs.remove(job_id).map(|_| ()).ok_or_else(|| not_found("Job"))
    }

    async fn list_tasks(&self, job_id: &str) -> Result<Vec<Task>> {
        self.record(Call::ListTasks(job_id.to_string()));
        let state = self.state.lock().unwrap();
        Ok(state.tasks.get(job_id).cloned().unwrap_or_default())
    }

    async fn add_tasks(&self, job_id: &str, tasks: &[TaskSpec]) -> Result<()> {
        self.record(Call::AddTasks(
            job_id.to_string(),
            tasks.iter().map(|t| t.id.clone()).collect(),
        ));
        let mut state = self.state.lock().unwrap();
        let existing = state.tasks.entry(job_id.to_string()).or_default();

        for spec in tasks {
            if existing.iter().any(|t| t.id == spec.id) {
                return Err(ClientError::TaskRejected {
                    task_id: spec.id.clone(),
                    code: Some(codes::TASK_EXISTS.to_string()),
                    message: "The specified task already exists.".to_string(),
                });
            }

            let (state, exit_code, result, failure) = match self.behaviour {
                TaskBehaviour::NeverFinish => (TaskState::Running, None, None, None),
                TaskBehaviour::FailTask(id) if id == spec.id => (
                    TaskState::Completed,
                    Some(1),
                    Some(ExecutionResult::Failure),
                    Some(failure()),
                ),
                _ => (TaskState::Completed, Some(0), Some(ExecutionResult::Success), None),
            };
            existing.push(Task {
                id: spec.id.clone(),
                command_line: spec.command_line.clone(),
                state,
                node_id: Some("tvmps_node_1".to_string()),
                exit_code,
                result,
                failure,
                creation_time: None,
            });
        }
        Ok(())
    }

    async fn get_task_file(&self, job_id: &str, task_id: &str, file_name: &str) -> Result<String> {
        self.record(Call::GetTaskFile(task_id.to_string(), file_name.to_string()));
        if self.fail_output_for.as_deref() == Some(task_id) {
            return Err(ClientError::api_error(
                404,
                Some("NodeNotReady".to_string()),
                "the node that ran the task is gone",
            ));
        }
        let state = self.state.lock().unwrap();
        let task = state
            .tasks
            .get(job_id)
            .and_then(|tasks| tasks.iter().find(|t| t.id == task_id))
            .ok_or_else(|| not_found("Task"))?;

        Ok(match file_name {
            "stdout.txt" => format!("output of {}\n", task.id),
            _ => String::new(),
        })
    }

    async fn list_supported_images(&self) -> Result<Vec<ImageInformation>> {
        self.record(Call::ListSupportedImages);
        Ok(self.images.clone())
    }
}

/// Object store listing fixed objects, signing with a real account key
pub struct FakeStore {
    signer: BlobClient,
    objects: Vec<(String, String)>,
}

impl FakeStore {
    pub fn new(objects: &[(&str, &str)]) -> Self {
        Self {
            signer: BlobClient::new("samydata", &SecretString::from(STORAGE_KEY.to_string()))
                .unwrap(),
            objects: objects
                .iter()
                .map(|(c, n)| (c.to_string(), n.to_string()))
                .collect(),
        }
    }

    /// Store seeded with the artifacts the built-in workflows use
    pub fn seeded() -> Self {
        Self::new(&[
            ("apps", "k8s-single-node.sh"),
            ("k8s", "tesk/namespace.yaml"),
            ("k8s", "tesk/deployment.yaml"),
            ("tesk-tasks", "Env/env.json"),
            ("tesk-tasks", "Hello/hello.json"),
        ])
    }
}

#[async_trait]
impl BlobRepository for FakeStore {
    fn signed_url(&self, container: &str, object_path: &str, ttl: Duration) -> Result<String> {
        self.signer.signed_url(container, object_path, ttl)
    }

    async fn list_objects(&self, container: &str, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .objects
            .iter()
            .filter(|(c, n)| c == container && n.starts_with(prefix))
            .map(|(_, n)| n.clone())
            .collect())
    }
}

/// Configuration as read from a complete environment
pub fn config() -> EnvironmentConfig {
    let vars: BTreeMap<&str, &str> = BTreeMap::from([
        ("AZURE_AD_TENANT_ID", "tenant"),
        ("AZURE_AD_SP_CLIENT_ID", "client"),
        ("AZURE_AD_SP_CLIENT_SECRET", "secret"),
        ("AZURE_BATCH_ACCOUNT_NAME", "batchtes01"),
        ("AZURE_BATCH_ACCOUNT_URL", "https://batchtes01.westus2.batch.azure.com"),
        ("AZURE_STORAGE_ACCOUNT_NAME", "samydata"),
        ("AZURE_STORAGE_ACCOUNT_KEY", STORAGE_KEY),
        ("AZURE_STORAGE_APP_DIRECTORY", "apps"),
        ("AZURE_ACR_NAME", "batchtes01.azurecr.io"),
        ("AZURE_ACR_USER", "acr-user"),
        ("AZURE_ACR_USER_PWD", "acr-pwd"),
        ("AZURE_BATCH_VM_IMAGE_ID", "/subscriptions/s/images/k8s-single-node"),
        ("AZURE_BATCH_VM_SIZE", "STANDARD_D2_V3"),
        ("AZURE_BATCH_VM_NODE_COUNT", "2"),
        ("AZURE_BATCH_POLL_INTERVAL", "1"),
    ]);
    EnvironmentConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap()
}

/// Engine wired to fakes
pub struct TestEngine {
    pub engine: WorkflowEngine,
    pub compute: Arc<FakeCompute>,
    pub locator: Arc<ResourceLocator>,
}

impl TestEngine {
    pub fn new(compute: FakeCompute) -> Self {
        let config = config();
        let compute = Arc::new(compute);
        let locator = Arc::new(ResourceLocator::new(Arc::new(FakeStore::seeded())));
        let context =
            WorkflowContext::new(Arc::clone(&locator), WorkflowSettings::from_config(&config));
        let registry = Arc::new(WorkflowRegistry::with_builtin(context).unwrap());

        let engine = WorkflowEngine::new(
            EngineKind::Kubernetes,
            POOL_ID,
            Arc::new(config),
            registry,
            compute.clone(),
            Arc::clone(&locator),
        );

        Self {
            engine,
            compute,
            locator,
        }
    }
}
