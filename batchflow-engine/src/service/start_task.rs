//! Pool start task
//!
//! Every pool node runs a start task before it accepts work. The task
//! downloads an application script from the app container and runs it as
//! the pool's user account.

use batchflow_core::domain::pool::StartTask;
use std::sync::Arc;

use crate::error::EngineError;
use crate::service::ResourceLocator;

/// Single-node Kubernetes bootstrap script
pub const K8S_SINGLE_NODE: &str = "k8s-single-node.sh";

pub const START_TASK_MAX_RETRIES: i32 = 2;

pub struct StartTaskFactory {
    locator: Arc<ResourceLocator>,
    app_container: String,
}

impl StartTaskFactory {
    pub fn new(locator: Arc<ResourceLocator>, app_container: impl Into<String>) -> Self {
        Self {
            locator,
            app_container: app_container.into(),
        }
    }

    /// Builds the start task running `application` as `user_name`
    ///
    /// Fails with `UnsupportedApplication` for anything but the known
    /// bootstrap scripts.
    pub fn start_task(&self, application: &str, user_name: &str) -> Result<StartTask, EngineError> {
        if application != K8S_SINGLE_NODE {
            return Err(EngineError::UnsupportedApplication(application.to_string()));
        }

        let script = self
            .locator
            .get_resource_file(&self.app_container, application, "")?;

        Ok(StartTask {
            command_line: format!("/bin/sh -c ./{}", application),
            resource_files: vec![script],
            user_name: Some(user_name.to_string()),
            max_task_retry_count: START_TASK_MAX_RETRIES,
            wait_for_success: true,
        })
    }
}
