//! Session domain types
//!
//! One session is one linear run of the engine: ensure pool, ensure job,
//! submit tasks, wait, collect, optionally tear down.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::pool::PoolStatus;
use crate::domain::task::TaskOutcome;

/// Steps of a session
///
/// `Idle → PoolEnsuring → JobEnsuring → TasksSubmitting → Polling →
/// Collecting → (Cleanup) → Done`; `Aborted` is reachable from any step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    PoolEnsuring,
    JobEnsuring,
    TasksSubmitting,
    Polling,
    Collecting,
    Cleanup,
    Done,
    Aborted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::PoolEnsuring => "pool-ensuring",
            SessionState::JobEnsuring => "job-ensuring",
            SessionState::TasksSubmitting => "tasks-submitting",
            SessionState::Polling => "polling",
            SessionState::Collecting => "collecting",
            SessionState::Cleanup => "cleanup",
            SessionState::Done => "done",
            SessionState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeardownTarget {
    Job,
    Pool,
}

/// A best-effort teardown step that failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownIssue {
    pub target: TeardownTarget,
    pub id: String,
    pub message: String,
}

/// Structured result of a session
///
/// Returned on success and attached to the error on abort, so results
/// collected before the abort point are never discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    pub job_id: String,
    pub pool_id: String,
    /// Last state the session reached
    pub state: SessionState,
    pub pool: Option<PoolStatus>,
    /// `Some(false)` when the job already existed
    pub job_created: Option<bool>,
    /// Task ids in submission order
    pub submitted: Vec<String>,
    pub tasks: Vec<TaskOutcome>,
    pub teardown: Vec<TeardownIssue>,
}

impl SessionReport {
    pub fn new(job_id: impl Into<String>, pool_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            pool_id: pool_id.into(),
            state: SessionState::Idle,
            pool: None,
            job_created: None,
            submitted: Vec::new(),
            tasks: Vec::new(),
            teardown: Vec::new(),
        }
    }

    /// Outcomes of tasks that reported `Failure`
    pub fn failed_tasks(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.tasks.iter().filter(|t| !t.succeeded())
    }

    pub fn all_succeeded(&self) -> bool {
        self.tasks.iter().all(TaskOutcome::succeeded)
    }
}
