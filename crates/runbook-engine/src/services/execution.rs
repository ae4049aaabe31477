//! Execution management service.
//!
//! Enqueueing runbooks, status queries, stop requests, history cleanup and
//! ad-hoc single block runs.

use runbook_tools::{Block, BlockResult, BlockSpec, ExecutionEnvironment, Executors};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::condition::ConditionEvaluator;
use crate::error::{EngineError, EngineResult};
use crate::model::{Job, JobReport, JobStatus, JobSummary, RunbookVersion};
use crate::store::Stores;

const UNKNOWN_RUNBOOK_TITLE: &str = "Unknown Runbook";

/// Execution management service.
#[derive(Clone)]
pub struct ExecutionService {
    stores: Stores,
    executors: Arc<Executors>,
    conditions: ConditionEvaluator,
    wake: Arc<Notify>,
}

impl ExecutionService {
    /// `wake` is shared with the worker so an enqueue starts it immediately.
    pub fn new(stores: Stores, executors: Arc<Executors>, wake: Arc<Notify>) -> Self {
        Self {
            stores,
            conditions: ConditionEvaluator::new(executors.clone()),
            executors,
            wake,
        }
    }

    /// Create a pending job for a specific version.
    pub async fn enqueue(&self, runbook_id: Uuid, version_id: Uuid) -> EngineResult<Job> {
        self.require_runbook(runbook_id).await?;

        let version = self
            .stores
            .runbooks
            .get_version(version_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Runbook version not found".to_string()))?;
        if version.runbook_id != runbook_id {
            return Err(EngineError::BadRequest(
                "Version does not belong to this runbook".to_string(),
            ));
        }

        self.insert_pending(&version).await
    }

    /// Create a pending job for the runbook's latest version.
    pub async fn enqueue_latest(&self, runbook_id: Uuid) -> EngineResult<Job> {
        self.require_runbook(runbook_id).await?;

        let version = self
            .stores
            .runbooks
            .latest_version(runbook_id)
            .await?
            .ok_or_else(|| {
                EngineError::BadRequest("Cannot execute a runbook with no versions".to_string())
            })?;

        self.insert_pending(&version).await
    }

    /// Job status and its steps in recorded order.
    pub async fn get_status(&self, job_id: Uuid) -> EngineResult<JobReport> {
        let job = self.require_job(job_id).await?;
        let steps = self.stores.jobs.list_steps(job_id).await?;

        Ok(JobReport {
            job_id: job.id,
            status: job.status,
            steps,
        })
    }

    /// All jobs newest first, each with its runbook's title.
    pub async fn list_executions(&self) -> EngineResult<Vec<JobSummary>> {
        let jobs = self.stores.jobs.list_jobs().await?;
        let mut titles: HashMap<Uuid, String> = HashMap::new();
        let mut summaries = Vec::with_capacity(jobs.len());

        for job in jobs {
            let runbook_title = match titles.get(&job.runbook_id) {
                Some(title) => title.clone(),
                None => {
                    let title = self
                        .stores
                        .runbooks
                        .get_runbook(job.runbook_id)
                        .await?
                        .map(|r| r.title)
                        .unwrap_or_else(|| UNKNOWN_RUNBOOK_TITLE.to_string());
                    titles.insert(job.runbook_id, title.clone());
                    title
                }
            };
            summaries.push(JobSummary { job, runbook_title });
        }

        Ok(summaries)
    }

    /// Force a pending or running job to `failed`.
    ///
    /// The runner notices at its next block boundary; the block in flight
    /// finishes normally.
    pub async fn request_stop(&self, job_id: Uuid) -> EngineResult<Job> {
        let job = self.require_job(job_id).await?;

        match self
            .stores
            .jobs
            .transition_job(
                job_id,
                &[JobStatus::Pending, JobStatus::Running],
                JobStatus::Failed,
            )
            .await?
        {
            Some(stopped) => {
                tracing::info!(%job_id, previous = %job.status, "Job stop requested");
                Ok(stopped)
            }
            None => {
                // The job may have finished between the read and the transition.
                let current = self.require_job(job_id).await?;
                Err(EngineError::BadRequest(format!(
                    "Cannot stop a job in '{}' state.",
                    current.status
                )))
            }
        }
    }

    /// Delete every job and step.
    pub async fn clear_history(&self) -> EngineResult<u64> {
        let removed = self.stores.jobs.clear_history().await?;
        tracing::info!(removed, "Execution history cleared");
        Ok(removed)
    }

    /// Run one block outside any job. Nothing is recorded.
    ///
    /// A condition block only evaluates its predicate.
    pub async fn run_single_block(
        &self,
        block: &Block,
        environment_id: Option<Uuid>,
    ) -> EngineResult<BlockResult> {
        let environment = self.resolve_environment(environment_id).await?;

        let result = match &block.spec {
            BlockSpec::Condition(config) => {
                let outcome = self
                    .conditions
                    .evaluate(&config.predicate, environment.as_ref())
                    .await;
                BlockResult::success(outcome.step_output(), 0)
            }
            BlockSpec::Unknown { kind, .. } => {
                return Err(EngineError::BadRequest(format!(
                    "Block type '{kind}' is not supported."
                )));
            }
            BlockSpec::Invalid { kind, reason, .. } => {
                return Err(EngineError::BadRequest(format!(
                    "Invalid {kind} block configuration: {reason}"
                )));
            }
            _ => self.executors.execute(block, environment.as_ref()).await,
        };

        tracing::info!(
            block_id = %block.id,
            kind = %block.kind(),
            status = %result.status,
            exit_code = result.exit_code,
            "Single block executed"
        );
        Ok(result)
    }

    async fn insert_pending(&self, version: &RunbookVersion) -> EngineResult<Job> {
        let job = Job::pending(version.runbook_id, version.id);
        self.stores.jobs.insert_job(&job).await?;
        self.wake.notify_one();

        tracing::info!(
            job_id = %job.id,
            runbook_id = %job.runbook_id,
            version = version.version_number,
            "Job enqueued"
        );
        Ok(job)
    }

    async fn require_runbook(&self, runbook_id: Uuid) -> EngineResult<()> {
        match self.stores.runbooks.get_runbook(runbook_id).await? {
            Some(_) => Ok(()),
            None => Err(EngineError::NotFound("Runbook not found".to_string())),
        }
    }

    async fn require_job(&self, job_id: Uuid) -> EngineResult<Job> {
        self.stores
            .jobs
            .get_job(job_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Job not found".to_string()))
    }

    async fn resolve_environment(
        &self,
        environment_id: Option<Uuid>,
    ) -> EngineResult<Option<ExecutionEnvironment>> {
        let Some(id) = environment_id else {
            return Ok(None);
        };
        self.stores
            .environments
            .get_environment(id)
            .await?
            .map(Some)
            .ok_or_else(|| EngineError::NotFound("Execution environment not found".to_string()))
    }
}
