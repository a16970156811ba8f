//! Service layer
//!
//! Services contain the logic the engine and the workflows share on top
//! of the repositories: signing artifact locations for compute nodes and
//! building the pool start task.

pub(crate) mod locator;
mod start_task;

pub use locator::{DEFAULT_SAS_TTL, ResourceLocator};
pub use start_task::{K8S_SINGLE_NODE, START_TASK_MAX_RETRIES, StartTaskFactory};
