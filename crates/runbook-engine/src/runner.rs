//! Job state machine.
//!
//! `pending -> running -> {completed | failed}`. The runner only moves a job
//! out of `pending` at start and out of `running` at the end, both with
//! compare-and-set transitions, so a stop request that lands at any point is
//! never overwritten.

use runbook_tools::{Block, ExecutionEnvironment};
use uuid::Uuid;

use crate::dispatcher::BlockDispatcher;
use crate::error::EngineResult;
use crate::model::{Job, JobStatus};
use crate::result_ext::OptionExt;
use crate::store::Stores;

/// How a job run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Every top-level block succeeded.
    Completed,
    /// The given top-level block failed.
    Failed { block_id: Uuid },
    /// The job was stopped externally; the runner left its status alone.
    Stopped,
    /// The referenced version does not exist.
    VersionMissing,
    /// The referenced runbook does not exist.
    RunbookMissing,
    /// The job was no longer pending when the runner picked it up.
    Skipped,
    /// The run raised an error or panicked and the worker forced it to failed.
    Aborted { reason: String },
}

/// Runs one job to a terminal state.
#[derive(Clone)]
pub struct JobRunner {
    stores: Stores,
    dispatcher: BlockDispatcher,
}

impl JobRunner {
    pub fn new(stores: Stores, dispatcher: BlockDispatcher) -> Self {
        Self { stores, dispatcher }
    }

    #[tracing::instrument(skip(self, job), fields(job_id = %job.id))]
    pub async fn run(&self, job: &Job) -> EngineResult<JobOutcome> {
        let jobs = &self.stores.jobs;

        let Some(job) = jobs
            .transition_job(job.id, &[JobStatus::Pending], JobStatus::Running)
            .await?
        else {
            tracing::info!("Job is no longer pending, skipping");
            return Ok(JobOutcome::Skipped);
        };
        tracing::info!(version_id = %job.version_id, "Job started");

        let version = self
            .stores
            .runbooks
            .get_version(job.version_id)
            .await?
            .log_none(format!("runbook version {} for job {}", job.version_id, job.id));
        let Some(version) = version else {
            self.finish(job.id, JobStatus::Failed).await?;
            return Ok(JobOutcome::VersionMissing);
        };

        let Some(environment) = self.resolve_environment(&job).await? else {
            self.finish(job.id, JobStatus::Failed).await?;
            return Ok(JobOutcome::RunbookMissing);
        };

        let mut blocks: Vec<&Block> = version.blocks.iter().collect();
        blocks.sort_by_key(|block| block.order);

        for block in blocks {
            let current = jobs.get_job(job.id).await?.map(|j| j.status);
            if current != Some(JobStatus::Running) {
                tracing::info!(status = ?current, "Job stopped externally, halting");
                return Ok(JobOutcome::Stopped);
            }

            if !self
                .dispatcher
                .dispatch(job.id, block, environment.as_ref())
                .await?
            {
                tracing::warn!(block_id = %block.id, "Block failed, failing job");
                return Ok(if self.finish(job.id, JobStatus::Failed).await? {
                    JobOutcome::Failed { block_id: block.id }
                } else {
                    JobOutcome::Stopped
                });
            }
        }

        Ok(if self.finish(job.id, JobStatus::Completed).await? {
            tracing::info!("Job completed");
            JobOutcome::Completed
        } else {
            JobOutcome::Stopped
        })
    }

    /// Resolve the runbook's environment.
    ///
    /// Outer `None` means the runbook itself is missing. An environment id
    /// that no longer resolves falls back to local execution.
    async fn resolve_environment(
        &self,
        job: &Job,
    ) -> EngineResult<Option<Option<ExecutionEnvironment>>> {
        let Some(runbook) = self.stores.runbooks.get_runbook(job.runbook_id).await? else {
            tracing::warn!(runbook_id = %job.runbook_id, "Runbook not found");
            return Ok(None);
        };

        let Some(environment_id) = runbook.environment_id else {
            return Ok(Some(None));
        };

        let environment = self
            .stores
            .environments
            .get_environment(environment_id)
            .await?;
        match &environment {
            Some(env) => tracing::info!(
                environment = %env.name,
                image = ?env.image_tag,
                "Using execution environment"
            ),
            None => tracing::warn!(%environment_id, "Execution environment not found, running locally"),
        }
        Ok(Some(environment))
    }

    /// Move `running -> to`. `false` means the job had already left `running`.
    async fn finish(&self, job_id: Uuid, to: JobStatus) -> EngineResult<bool> {
        Ok(self
            .stores
            .jobs
            .transition_job(job_id, &[JobStatus::Running], to)
            .await?
            .is_some())
    }
}
