//! Task monitor
//!
//! The completion barrier of a session. Polls a job's task list on a
//! bounded interval and returns once every task is terminal. Only one
//! barrier may poll a given job at a time.

use batchflow_core::domain::task::{Task, TaskSnapshot};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::repository::ComputeRepository;

/// Deadline `timeout` from now
///
/// # Errors
/// `Configuration` when the deadline is past what the clock can represent.
pub fn deadline_after(timeout: Duration) -> Result<Instant, EngineError> {
    Instant::now().checked_add(timeout).ok_or_else(|| {
        EngineError::Configuration(format!("timeout {:?} is out of range", timeout))
    })
}

/// Completion barrier over a compute service
pub struct TaskMonitor {
    compute: Arc<dyn ComputeRepository>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Releases the job's polling slot when the barrier returns
struct PollGuard {
    job_id: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Drop for PollGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.job_id);
    }
}

impl TaskMonitor {
    pub fn new(compute: Arc<dyn ComputeRepository>) -> Self {
        Self {
            compute,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn acquire(&self, job_id: &str) -> Result<PollGuard, EngineError> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if !in_flight.insert(job_id.to_string()) {
            return Err(EngineError::PollInFlight(job_id.to_string()));
        }

        Ok(PollGuard {
            job_id: job_id.to_string(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Waits until every task of `job_id` is terminal
    ///
    /// Returns the tasks as seen by the poll that found them all terminal.
    ///
    /// # Errors
    /// - `Timeout` once `timeout` elapses, carrying the last observed states
    /// - `Cancelled` when `cancel` trips
    /// - `Remote` when listing the tasks fails
    /// - `PollInFlight` when another barrier is already polling the job
    /// - `Configuration` when `timeout` cannot be turned into a deadline
    pub async fn wait_all_terminal(
        &self,
        job_id: &str,
        timeout: Duration,
        poll_interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<Task>, EngineError> {
        let deadline = deadline_after(timeout)?;
        let _guard = self.acquire(job_id)?;

        info!(
            "Monitoring tasks of job {} for completion (timeout {:?})",
            job_id, timeout
        );

        let mut observed: Vec<TaskSnapshot> = Vec::new();
        let timed_out = |observed: Vec<TaskSnapshot>| EngineError::Timeout {
            job_id: job_id.to_string(),
            timeout,
            observed,
        };

        loop {
            let tasks = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                listed = time::timeout_at(deadline, self.compute.list_tasks(job_id)) => match listed {
                    Ok(result) => result.map_err(|e| EngineError::remote("list tasks", e))?,
                    Err(_) => return Err(timed_out(observed)),
                },
            };

            let pending = tasks.iter().filter(|t| !t.is_terminal()).count();
            if pending == 0 {
                info!("All {} task(s) of job {} are completed", tasks.len(), job_id);
                return Ok(tasks);
            }

            debug!(
                "{} of {} task(s) of job {} still pending",
                pending,
                tasks.len(),
                job_id
            );
            observed = tasks.iter().map(TaskSnapshot::from).collect();

            let now = Instant::now();
            if now >= deadline {
                return Err(timed_out(observed));
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                _ = time::sleep(poll_interval.min(deadline - now)) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use batchflow_client::Result;
    use batchflow_core::domain::job::JobDescriptor;
    use batchflow_core::domain::pool::{ImageInformation, Pool, PoolDescriptor};
    use batchflow_core::domain::task::{TaskSpec, TaskState};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reports `running_polls` rounds of a running task, then completes it
    struct ScriptedCompute {
        running_polls: usize,
        polls: AtomicUsize,
    }

    impl ScriptedCompute {
        fn new(running_polls: usize) -> Self {
            Self {
                running_polls,
                polls: AtomicUsize::new(0),
            }
        }
    }

    fn task(state: TaskState) -> Task {
        Task {
            id: "Get-cluster-info".to_string(),
            command_line: "kubectl cluster-info".to_string(),
            state,
            node_id: None,
            exit_code: None,
            result: None,
            failure: None,
            creation_time: None,
        }
    }

    #[async_trait]
    impl ComputeRepository for ScriptedCompute {
        async fn create_pool(&self, _pool: &PoolDescriptor) -> Result<()> {
            unimplemented!()
        }
        async fn get_pool(&self, _pool_id: &str) -> Result<Pool> {
            unimplemented!()
        }
        async fn delete_pool(&self, _pool_id: &str) -> Result<()> {
            unimplemented!()
        }
        async fn create_job(&self, _job: &JobDescriptor) -> Result<()> {
            unimplemented!()
        }
        async fn delete_job(&self, _job_id: &str) -> Result<()> {
            unimplemented!()
        }
        async fn list_tasks(&self, _job_id: &str) -> Result<Vec<Task>> {
            let poll = self.polls.fetch_add(1, Ordering::SeqCst);
            if poll < self.running_polls {
                Ok(vec![task(TaskState::Running)])
            } else {
                Ok(vec![task(TaskState::Completed)])
            }
        }
        async fn add_tasks(&self, _job_id: &str, _tasks: &[TaskSpec]) -> Result<()> {
            unimplemented!()
        }
        async fn get_task_file(&self, _job: &str, _task: &str, _file: &str) -> Result<String> {
            unimplemented!()
        }
        async fn list_supported_images(&self) -> Result<Vec<ImageInformation>> {
            unimplemented!()
        }
    }

    const FAST: Duration = Duration::from_millis(10);

    #[tokio::test]
    async fn test_returns_once_all_terminal() {
        let compute = Arc::new(ScriptedCompute::new(2));
        let monitor = TaskMonitor::new(compute.clone());

        let tasks = monitor
            .wait_all_terminal("job-1", Duration::from_secs(5), FAST, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].state, TaskState::Completed);
        assert_eq!(compute.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeout_keeps_observed_states() {
        let monitor = TaskMonitor::new(Arc::new(ScriptedCompute::new(usize::MAX)));

        let err = monitor
            .wait_all_terminal("job-1", Duration::from_millis(200), FAST, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            EngineError::Timeout { job_id, observed, .. } => {
                assert_eq!(job_id, "job-1");
                assert_eq!(observed.len(), 1);
                assert_eq!(observed[0].state, TaskState::Running);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancellation() {
        let monitor = TaskMonitor::new(Arc::new(ScriptedCompute::new(usize::MAX)));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = monitor
            .wait_all_terminal("job-1", Duration::from_secs(5), FAST, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
    }

    #[tokio::test]
    async fn test_one_barrier_per_job() {
        let monitor = Arc::new(TaskMonitor::new(Arc::new(ScriptedCompute::new(usize::MAX))));
        let cancel = CancellationToken::new();

        let first = {
            let monitor = Arc::clone(&monitor);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                monitor
                    .wait_all_terminal("job-1", Duration::from_secs(5), FAST, &cancel)
                    .await
            })
        };
        time::sleep(Duration::from_millis(50)).await;

        let second = monitor
            .wait_all_terminal("job-1", Duration::from_secs(5), FAST, &cancel)
            .await;
        assert!(matches!(second, Err(EngineError::PollInFlight(id)) if id == "job-1"));

        let other_job = monitor
            .wait_all_terminal("job-2", Duration::from_millis(30), FAST, &cancel)
            .await;
        assert!(matches!(other_job, Err(EngineError::Timeout { .. })));

        cancel.cancel();
        assert!(matches!(first.await.unwrap(), Err(EngineError::Cancelled)));

        // Slot is free again once the first barrier returned
        let again = monitor
            .wait_all_terminal("job-1", Duration::from_millis(30), FAST, &CancellationToken::new())
            .await;
        assert!(matches!(again, Err(EngineError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_unrepresentable_timeout_is_rejected() {
        let compute = Arc::new(ScriptedCompute::new(0));
        let monitor = TaskMonitor::new(compute.clone());

        let err = monitor
            .wait_all_terminal("job-1", Duration::from_secs(u64::MAX), FAST, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Configuration(msg) if msg.contains("out of range")));
        assert_eq!(compute.polls.load(Ordering::SeqCst), 0);
    }
}
