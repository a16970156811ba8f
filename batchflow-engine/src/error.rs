//! Engine error types

use batchflow_client::ClientError;
use batchflow_core::domain::session::SessionReport;
use batchflow_core::domain::task::TaskSnapshot;
use batchflow_core::domain::workflow::WorkflowType;
use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while building or running an orchestration session
#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or invalid configuration, or nothing to run
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Workflow type '{0}' is already registered")]
    DuplicateType(WorkflowType),

    #[error("Workflow type '{0}' is not registered")]
    UnknownType(WorkflowType),

    #[error("Engine kind '{0}' is not supported")]
    UnsupportedEngine(String),

    #[error("Application '{0}' has no start task")]
    UnsupportedApplication(String),

    /// No supported node image matched the configured publisher/offer/sku
    #[error("No supported node image matches {0}")]
    NoMatchingImage(String),

    /// Any remote failure other than the pool/job idempotency conditions
    #[error("{operation} failed: {source}")]
    Remote {
        operation: &'static str,
        #[source]
        source: ClientError,
    },

    /// The completion barrier elapsed before every task was terminal
    #[error("Tasks of job '{job_id}' did not complete within {timeout:?}")]
    Timeout {
        job_id: String,
        timeout: Duration,
        /// Task states seen by the last successful poll
        observed: Vec<TaskSnapshot>,
    },

    #[error("Session cancelled")]
    Cancelled,

    #[error("A completion barrier is already polling job '{0}'")]
    PollInFlight(String),
}

impl EngineError {
    /// Wrap a remote failure with the operation that produced it
    pub fn remote(operation: &'static str, source: ClientError) -> Self {
        Self::Remote { operation, source }
    }

    /// Check if this is a completion barrier timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// An aborted session
///
/// Carries everything collected before the abort point.
#[derive(Debug, Error)]
#[error("Session for job '{}' aborted: {error}", .report.job_id)]
pub struct SessionFailure {
    #[source]
    pub error: EngineError,
    pub report: SessionReport,
}

impl SessionFailure {
    pub fn new(error: EngineError, report: SessionReport) -> Self {
        Self { error, report }
    }
}
