//! Background execution worker.
//!
//! Polls for the oldest pending job and runs it to completion, one job at a
//! time. An enqueue can wake the worker early through a shared [`Notify`].
//! Any error or panic escaping a job run forces that job to `failed` so it
//! never stays `running` forever. Shutdown is only observed between jobs;
//! the job in flight always runs to a terminal state.

use futures::FutureExt;
use runbook_tools::BlockResult;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::model::{Job, JobStatus, StepStatus};
use crate::result_ext::ResultExt;
use crate::runner::{JobOutcome, JobRunner};
use crate::store::JobStore;

/// Long-running job consumer.
pub struct ExecutionWorker {
    worker_id: String,
    jobs: Arc<dyn JobStore>,
    runner: JobRunner,
    wake: Arc<Notify>,
    poll_interval: Duration,
}

impl ExecutionWorker {
    pub fn new(
        worker_id: impl Into<String>,
        jobs: Arc<dyn JobStore>,
        runner: JobRunner,
        wake: Arc<Notify>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            jobs,
            runner,
            wake,
            poll_interval,
        }
    }

    /// Run at most one pending job.
    ///
    /// Returns `None` when nothing was pending. Errors are polling failures;
    /// failures inside the run are folded into [`JobOutcome::Aborted`].
    pub async fn run_once(&self) -> EngineResult<Option<(Uuid, JobOutcome)>> {
        let Some(job) = self.jobs.next_pending_job().await? else {
            return Ok(None);
        };

        tracing::info!(worker_id = %self.worker_id, job_id = %job.id, "Picked up job");
        let outcome = self.process(&job).await;
        tracing::info!(worker_id = %self.worker_id, job_id = %job.id, outcome = ?outcome, "Job processed");

        Ok(Some((job.id, outcome)))
    }

    /// Poll until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        tracing::info!(
            worker_id = %self.worker_id,
            hostname = %hostname,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Execution worker started"
        );

        while !shutdown.is_cancelled() {
            let idle = match self.run_once().await.log("polling for pending jobs") {
                Ok(Some(_)) => continue,
                Ok(None) => true,
                Err(_) => false,
            };

            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = self.wake.notified(), if idle => {
                    tracing::trace!("Worker woken by enqueue");
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        tracing::info!(worker_id = %self.worker_id, "Execution worker stopped");
    }

    /// Fail every job left `running` by a process that died mid-run.
    ///
    /// Only safe while no other worker is running jobs against the same store.
    pub async fn recover_orphaned_jobs(&self) -> EngineResult<u64> {
        let mut recovered = 0;
        for job in self.jobs.list_jobs().await? {
            if job.status != JobStatus::Running {
                continue;
            }
            if self
                .fail_job(job.id, &[JobStatus::Running], INTERRUPTED)
                .await?
            {
                recovered += 1;
            }
        }

        if recovered > 0 {
            tracing::warn!(worker_id = %self.worker_id, recovered, "Failed orphaned running jobs");
        }
        Ok(recovered)
    }

    async fn process(&self, job: &Job) -> JobOutcome {
        let reason = match AssertUnwindSafe(self.runner.run(job)).catch_unwind().await {
            Ok(Ok(outcome)) => return outcome,
            Ok(Err(e)) => {
                tracing::error!(job_id = %job.id, error = %e, "Job run failed");
                e.to_string()
            }
            Err(panic) => {
                let reason = panic_message(&*panic);
                tracing::error!(job_id = %job.id, panic = %reason, "Job run panicked");
                reason
            }
        };

        if let Err(e) = self
            .fail_job(job.id, &[JobStatus::Pending, JobStatus::Running], &reason)
            .await
        {
            tracing::error!(job_id = %job.id, error = %e, "Failed to mark job as failed");
        }
        JobOutcome::Aborted { reason }
    }

    /// Move the job to `failed` and close any step still `running`.
    ///
    /// Steps are closed even when the job was already terminal, so a stop
    /// request racing a crash leaves no open step behind.
    async fn fail_job(
        &self,
        job_id: Uuid,
        allowed_from: &[JobStatus],
        reason: &str,
    ) -> EngineResult<bool> {
        let failed = self
            .jobs
            .transition_job(job_id, allowed_from, JobStatus::Failed)
            .await?
            .is_some();
        if failed {
            tracing::warn!(%job_id, "Job forced to failed");
        } else {
            tracing::debug!(%job_id, "Job already terminal");
        }

        for mut step in self.jobs.list_steps(job_id).await? {
            if step.status == StepStatus::Running {
                step.finish(BlockResult::not_attempted(reason));
                self.jobs.update_step(&step).await?;
                tracing::warn!(%job_id, step_id = %step.id, "Open step closed as error");
            }
        }
        Ok(failed)
    }
}

const INTERRUPTED: &str = "Execution interrupted before the block finished.";

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "job run panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::BlockDispatcher;
    use crate::error::EngineError;
    use crate::model::{Runbook, RunbookVersion, Step};
    use crate::store::{MemoryStore, RunbookStore, Stores};
    use async_trait::async_trait;
    use runbook_tools::{Block, Executors, ExecutorSettings, NoSecrets};

    enum Sabotage {
        Panic,
        Error,
    }

    /// Runbook store whose version lookup blows up.
    struct BrokenRunbooks(Sabotage);

    #[async_trait]
    impl RunbookStore for BrokenRunbooks {
        async fn get_runbook(&self, _id: Uuid) -> EngineResult<Option<Runbook>> {
            Ok(None)
        }

        async fn get_version(&self, _id: Uuid) -> EngineResult<Option<RunbookVersion>> {
            match self.0 {
                Sabotage::Panic => panic!("version lookup exploded"),
                Sabotage::Error => Err(EngineError::Internal("store offline".to_string())),
            }
        }

        async fn latest_version(&self, _runbook_id: Uuid) -> EngineResult<Option<RunbookVersion>> {
            Ok(None)
        }
    }

    /// Job store that refuses to record any step whose output contains `marker`.
    struct RefusingSteps {
        inner: Arc<MemoryStore>,
        marker: &'static str,
    }

    #[async_trait]
    impl JobStore for RefusingSteps {
        async fn insert_job(&self, job: &Job) -> EngineResult<()> {
            self.inner.insert_job(job).await
        }

        async fn get_job(&self, id: Uuid) -> EngineResult<Option<Job>> {
            self.inner.get_job(id).await
        }

        async fn next_pending_job(&self) -> EngineResult<Option<Job>> {
            self.inner.next_pending_job().await
        }

        async fn transition_job(
            &self,
            id: Uuid,
            allowed_from: &[JobStatus],
            to: JobStatus,
        ) -> EngineResult<Option<Job>> {
            self.inner.transition_job(id, allowed_from, to).await
        }

        async fn list_jobs(&self) -> EngineResult<Vec<Job>> {
            self.inner.list_jobs().await
        }

        async fn insert_step(&self, step: &Step) -> EngineResult<()> {
            self.inner.insert_step(step).await
        }

        async fn update_step(&self, step: &Step) -> EngineResult<()> {
            if step.output.contains(self.marker) {
                return Err(EngineError::Internal("step rejected".to_string()));
            }
            self.inner.update_step(step).await
        }

        async fn list_steps(&self, job_id: Uuid) -> EngineResult<Vec<Step>> {
            self.inner.list_steps(job_id).await
        }

        async fn clear_history(&self) -> EngineResult<u64> {
            self.inner.clear_history().await
        }
    }

    fn worker(stores: Stores) -> ExecutionWorker {
        let executors =
            Arc::new(Executors::new(ExecutorSettings::default(), Arc::new(NoSecrets)).unwrap());
        let dispatcher = BlockDispatcher::new(stores.jobs.clone(), executors);
        ExecutionWorker::new(
            "test-worker",
            stores.jobs.clone(),
            JobRunner::new(stores, dispatcher),
            Arc::new(Notify::new()),
            Duration::from_millis(50),
        )
    }

    async fn seed(store: &MemoryStore, blocks: Vec<Block>) -> Job {
        let runbook = Runbook::new("worker test");
        let version = RunbookVersion::new(runbook.id, 1, blocks);
        let job = Job::pending(runbook.id, version.id);
        store.put_runbook(runbook).await;
        store.put_version(version).await;
        store.insert_job(&job).await.unwrap();
        job
    }

    #[tokio::test]
    async fn test_run_once_idle() {
        let store = Arc::new(MemoryStore::new());
        let worker = worker(Stores::shared(store));
        assert!(worker.run_once().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_run_once_completes_job() {
        let store = Arc::new(MemoryStore::new());
        let job = seed(&store, vec![Block::command("echo hi")]).await;
        let worker = worker(Stores::shared(store.clone()));

        let (job_id, outcome) = worker.run_once().await.unwrap().unwrap();
        assert_eq!(job_id, job.id);
        assert_eq!(outcome, JobOutcome::Completed);
        assert!(worker.run_once().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oldest_pending_job_first() {
        let store = Arc::new(MemoryStore::new());
        let first = seed(&store, vec![Block::command("echo 1")]).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = seed(&store, vec![Block::command("echo 2")]).await;
        let worker = worker(Stores::shared(store.clone()));

        assert_eq!(worker.run_once().await.unwrap().unwrap().0, first.id);
        assert_eq!(worker.run_once().await.unwrap().unwrap().0, second.id);
    }

    async fn assert_forced_to_failed(sabotage: Sabotage) {
        let store = Arc::new(MemoryStore::new());
        let job = seed(&store, vec![Block::command("echo hi")]).await;
        let mut stores = Stores::shared(store.clone());
        stores.runbooks = Arc::new(BrokenRunbooks(sabotage));
        let worker = worker(stores);

        let (_, outcome) = worker.run_once().await.unwrap().unwrap();
        assert!(matches!(outcome, JobOutcome::Aborted { .. }));

        let stored = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert!(stored.end_time.is_some());
    }

    #[tokio::test]
    async fn test_run_error_forces_failed() {
        assert_forced_to_failed(Sabotage::Error).await;
    }

    #[tokio::test]
    async fn test_run_panic_forces_failed() {
        assert_forced_to_failed(Sabotage::Panic).await;
    }

    #[tokio::test]
    async fn test_notify_wakes_idle_worker() {
        let store = Arc::new(MemoryStore::new());
        let stores = Stores::shared(store.clone());
        let wake = Arc::new(Notify::new());
        let executors =
            Arc::new(Executors::new(ExecutorSettings::default(), Arc::new(NoSecrets)).unwrap());
        let worker = ExecutionWorker::new(
            "test-worker",
            stores.jobs.clone(),
            JobRunner::new(
                stores.clone(),
                BlockDispatcher::new(stores.jobs.clone(), executors),
            ),
            wake.clone(),
            Duration::from_secs(3600),
        );
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let handle = tokio::spawn(async move { worker.run(token).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let job = seed(&store, vec![Block::command("echo woke")]).await;
        wake.notify_one();

        let mut status = JobStatus::Pending;
        for _ in 0..200 {
            status = store.get_job(job.id).await.unwrap().unwrap().status;
            if status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_shutdown_lets_in_flight_job_finish() {
        let store = Arc::new(MemoryStore::new());
        let job = seed(
            &store,
            vec![Block::command("sleep 0.5"), Block::command("echo after")],
        )
        .await;
        let worker = worker(Stores::shared(store.clone()));

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let handle = tokio::spawn(async move { worker.run(token).await });

        // cancel while the first block is still sleeping
        loop {
            if !store.list_steps(job.id).await.unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .unwrap()
            .unwrap();

        let stored = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        let steps = store.list_steps(job.id).await.unwrap();
        assert_eq!(steps.len(), 2);
        assert!(steps.iter().all(|s| s.status == StepStatus::Success));
    }

    #[tokio::test]
    async fn test_shutdown_skips_pending_jobs() {
        let store = Arc::new(MemoryStore::new());
        let job = seed(&store, vec![Block::command("echo hi")]).await;
        let worker = worker(Stores::shared(store.clone()));

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        worker.run(shutdown).await;

        let stored = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_recover_orphaned_jobs() {
        let store = Arc::new(MemoryStore::new());
        let orphan = seed(&store, vec![Block::command("echo hi")]).await;
        let waiting = seed(&store, vec![Block::command("echo hi")]).await;
        store
            .transition_job(orphan.id, &[JobStatus::Pending], JobStatus::Running)
            .await
            .unwrap();
        let open = Step::running(orphan.id, Uuid::new_v4(), "");
        store.insert_step(&open).await.unwrap();
        let worker = worker(Stores::shared(store.clone()));

        assert_eq!(worker.recover_orphaned_jobs().await.unwrap(), 1);

        let stored = store.get_job(orphan.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert!(stored.end_time.is_some());
        let steps = store.list_steps(orphan.id).await.unwrap();
        assert_eq!(steps[0].status, StepStatus::Error);
        assert_eq!(steps[0].exit_code, -1);
        assert_eq!(steps[0].output, INTERRUPTED);

        let untouched = store.get_job(waiting.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, JobStatus::Pending);
        assert_eq!(worker.recover_orphaned_jobs().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_step_write_failure_closes_open_step() {
        let store = Arc::new(MemoryStore::new());
        let job = seed(
            &store,
            vec![Block::command("echo unwritable"), Block::command("echo never")],
        )
        .await;
        let mut stores = Stores::shared(store.clone());
        stores.jobs = Arc::new(RefusingSteps {
            inner: store.clone(),
            marker: "unwritable",
        });
        let worker = worker(stores);

        let (_, outcome) = worker.run_once().await.unwrap().unwrap();
        assert!(matches!(outcome, JobOutcome::Aborted { .. }));

        let stored = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        let steps = store.list_steps(job.id).await.unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].status, StepStatus::Error);
        assert_eq!(steps[0].exit_code, -1);
        assert!(steps[0].output.contains("step rejected"));
    }
}
