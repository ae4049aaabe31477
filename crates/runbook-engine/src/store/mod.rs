//! Storage seams.
//!
//! The engine reads runbooks, versions, credentials and environments, and
//! owns jobs and steps. Each concern is an object-safe async trait so the
//! worker and service can run against PostgreSQL or the in-memory store.

pub mod memory;

use async_trait::async_trait;
use runbook_tools::ExecutionEnvironment;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::model::{Credential, Job, JobStatus, Runbook, RunbookVersion, Step};

pub use memory::MemoryStore;

/// Read access to runbooks and their versions.
#[async_trait]
pub trait RunbookStore: Send + Sync {
    async fn get_runbook(&self, id: Uuid) -> EngineResult<Option<Runbook>>;

    async fn get_version(&self, id: Uuid) -> EngineResult<Option<RunbookVersion>>;

    /// The version with the highest `version_number`.
    async fn latest_version(&self, runbook_id: Uuid) -> EngineResult<Option<RunbookVersion>>;
}

/// Read access to stored credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_credential(&self, id: Uuid) -> EngineResult<Option<Credential>>;
}

/// Read access to execution environments.
#[async_trait]
pub trait EnvironmentStore: Send + Sync {
    async fn get_environment(&self, id: Uuid) -> EngineResult<Option<ExecutionEnvironment>>;
}

/// Job and step persistence.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, job: &Job) -> EngineResult<()>;

    async fn get_job(&self, id: Uuid) -> EngineResult<Option<Job>>;

    /// The oldest pending job by `start_time`.
    async fn next_pending_job(&self) -> EngineResult<Option<Job>>;

    /// Move a job to `to` only if its current status is in `allowed_from`.
    ///
    /// Sets `end_time` when `to` is terminal. Returns the updated job, or
    /// `None` when the job is missing or its status did not match.
    async fn transition_job(
        &self,
        id: Uuid,
        allowed_from: &[JobStatus],
        to: JobStatus,
    ) -> EngineResult<Option<Job>>;

    /// All jobs, newest first.
    async fn list_jobs(&self) -> EngineResult<Vec<Job>>;

    async fn insert_step(&self, step: &Step) -> EngineResult<()>;

    async fn update_step(&self, step: &Step) -> EngineResult<()>;

    /// Steps of a job in the order they were inserted.
    async fn list_steps(&self, job_id: Uuid) -> EngineResult<Vec<Step>>;

    /// Delete every job and step. Returns the number of jobs removed.
    async fn clear_history(&self) -> EngineResult<u64>;
}

/// The set of stores the engine runs against.
#[derive(Clone)]
pub struct Stores {
    pub runbooks: Arc<dyn RunbookStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub environments: Arc<dyn EnvironmentStore>,
    pub jobs: Arc<dyn JobStore>,
}

impl Stores {
    /// Use one backend for every concern.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: RunbookStore + CredentialStore + EnvironmentStore + JobStore + 'static,
    {
        Self {
            runbooks: store.clone(),
            credentials: store.clone(),
            environments: store.clone(),
            jobs: store,
        }
    }
}
