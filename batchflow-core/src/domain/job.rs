//! Job domain types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Job to create on the compute service
///
/// Identity key is `job_id`. Created once per session; an existing job
/// with the same id is reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub job_id: String,
    /// Pool the job's tasks are scheduled onto
    pub pool_id: String,
    pub metadata: BTreeMap<String, String>,
}

impl JobDescriptor {
    pub fn new(job_id: impl Into<String>, pool_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            pool_id: pool_id.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}
