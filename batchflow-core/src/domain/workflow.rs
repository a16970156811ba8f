//! Workflow identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Names of the workflow types shipped with Batchflow
pub mod builtin {
    /// Cluster inspection: cluster-info, version, list pods
    pub const K8S_DETAILS: &str = "get-k8s-details";
    /// Deploys the TESK manifests onto the node's cluster
    pub const TESK_DEPLOY: &str = "tesk-deploy";
    /// Probes a running TESK deployment
    pub const TESK_VERIFY: &str = "tesk-verify";
}

/// Symbolic name of a workflow type
///
/// Unique key into the workflow registry. Registered once at startup and
/// never removed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowType(String);

impl WorkflowType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkflowType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for WorkflowType {
    fn from(name: String) -> Self {
        Self(name)
    }
}
