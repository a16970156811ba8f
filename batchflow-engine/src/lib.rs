//! Batchflow Engine
//!
//! Orchestrates batch workflows against a remote compute service: it
//! provisions a pool, submits a job, schedules the tasks of every active
//! workflow onto that job, waits until all of them are terminal and
//! collects their output.
//!
//! Architecture:
//! - Configuration: settings resolved once from the environment
//! - Repositories: seams over the compute service and the object store
//! - Services: resource location and the pool start task
//! - Workflows: task-list producers, resolved through the registry
//! - Scheduler: the completion barrier
//! - Engine: the session driver
//!
//! # Example
//!
//! ```no_run
//! use batchflow_client::{BatchClient, BlobClient, ClientCredentialsProvider};
//! use batchflow_core::domain::workflow::{WorkflowType, builtin};
//! use batchflow_engine::{
//!     EngineKind, EnvironmentConfig, ExecutionRequest, ResourceLocator, WorkflowContext,
//!     WorkflowEngine, WorkflowRegistry, WorkflowSettings,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(EnvironmentConfig::from_env()?);
//! let tokens = ClientCredentialsProvider::new(
//!     &config.tenant_id,
//!     config.client_id.clone(),
//!     config.client_secret.clone(),
//! );
//! let compute = Arc::new(BatchClient::new(config.batch_account_url.clone(), Arc::new(tokens)));
//! let store = BlobClient::new(&config.storage_account_name, &config.storage_account_key)?;
//! let locator = Arc::new(ResourceLocator::with_ttl(Arc::new(store), config.sas_ttl));
//!
//! let context = WorkflowContext::new(Arc::clone(&locator), WorkflowSettings::from_config(&config));
//! let registry = Arc::new(WorkflowRegistry::with_builtin(context)?);
//!
//! let mut engine = WorkflowEngine::new(
//!     EngineKind::Kubernetes,
//!     "TES-BATCH-POOL-01",
//!     config,
//!     registry,
//!     compute,
//!     locator,
//! );
//! engine.add_workflow(&WorkflowType::new(builtin::K8S_DETAILS))?;
//!
//! let report = engine.execute_workflow(&ExecutionRequest::new("job-1")).await?;
//! for task in &report.tasks {
//!     println!("{}: {}", task.id, task.stdout);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod repository;
pub mod scheduler;
pub mod service;
pub mod workflow;

pub use config::{ConfigError, EnvironmentConfig};
pub use engine::{EngineKind, ExecutionRequest, WorkflowEngine};
pub use error::{EngineError, SessionFailure};
pub use registry::WorkflowRegistry;
pub use repository::{BlobRepository, ComputeRepository};
pub use scheduler::TaskMonitor;
pub use service::{ResourceLocator, StartTaskFactory};
pub use workflow::{Workflow, WorkflowContext, WorkflowKind, WorkflowSettings};
