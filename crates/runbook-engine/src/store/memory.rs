//! In-memory store.

use async_trait::async_trait;
use chrono::Utc;
use runbook_tools::ExecutionEnvironment;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CredentialStore, EnvironmentStore, JobStore, RunbookStore};
use crate::error::EngineResult;
use crate::model::{Credential, Job, JobStatus, Runbook, RunbookVersion, Step};

#[derive(Default)]
struct Inner {
    runbooks: HashMap<Uuid, Runbook>,
    versions: HashMap<Uuid, RunbookVersion>,
    credentials: HashMap<Uuid, Credential>,
    environments: HashMap<Uuid, ExecutionEnvironment>,
    // insertion order breaks start_time ties
    jobs: Vec<Job>,
    steps: Vec<Step>,
}

/// Store backed by process memory. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_runbook(&self, runbook: Runbook) {
        self.inner.write().await.runbooks.insert(runbook.id, runbook);
    }

    pub async fn put_version(&self, version: RunbookVersion) {
        self.inner.write().await.versions.insert(version.id, version);
    }

    pub async fn put_credential(&self, credential: Credential) {
        self.inner
            .write()
            .await
            .credentials
            .insert(credential.id, credential);
    }

    pub async fn put_environment(&self, environment: ExecutionEnvironment) {
        self.inner
            .write()
            .await
            .environments
            .insert(environment.id, environment);
    }

    pub async fn remove_runbook(&self, id: Uuid) {
        self.inner.write().await.runbooks.remove(&id);
    }
}

#[async_trait]
impl RunbookStore for MemoryStore {
    async fn get_runbook(&self, id: Uuid) -> EngineResult<Option<Runbook>> {
        Ok(self.inner.read().await.runbooks.get(&id).cloned())
    }

    async fn get_version(&self, id: Uuid) -> EngineResult<Option<RunbookVersion>> {
        Ok(self.inner.read().await.versions.get(&id).cloned())
    }

    async fn latest_version(&self, runbook_id: Uuid) -> EngineResult<Option<RunbookVersion>> {
        Ok(self
            .inner
            .read()
            .await
            .versions
            .values()
            .filter(|v| v.runbook_id == runbook_id)
            .max_by_key(|v| v.version_number)
            .cloned())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get_credential(&self, id: Uuid) -> EngineResult<Option<Credential>> {
        Ok(self.inner.read().await.credentials.get(&id).cloned())
    }
}

#[async_trait]
impl EnvironmentStore for MemoryStore {
    async fn get_environment(&self, id: Uuid) -> EngineResult<Option<ExecutionEnvironment>> {
        Ok(self.inner.read().await.environments.get(&id).cloned())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert_job(&self, job: &Job) -> EngineResult<()> {
        self.inner.write().await.jobs.push(job.clone());
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> EngineResult<Option<Job>> {
        Ok(self
            .inner
            .read()
            .await
            .jobs
            .iter()
            .find(|j| j.id == id)
            .cloned())
    }

    async fn next_pending_job(&self) -> EngineResult<Option<Job>> {
        Ok(self
            .inner
            .read()
            .await
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .min_by_key(|j| j.start_time)
            .cloned())
    }

    async fn transition_job(
        &self,
        id: Uuid,
        allowed_from: &[JobStatus],
        to: JobStatus,
    ) -> EngineResult<Option<Job>> {
        let mut inner = self.inner.write().await;
        let Some(job) = inner.jobs.iter_mut().find(|j| j.id == id) else {
            return Ok(None);
        };
        if !allowed_from.contains(&job.status) {
            return Ok(None);
        }

        job.status = to;
        if to.is_terminal() {
            job.end_time = Some(Utc::now());
        }
        Ok(Some(job.clone()))
    }

    async fn list_jobs(&self) -> EngineResult<Vec<Job>> {
        let mut jobs = self.inner.read().await.jobs.clone();
        jobs.reverse();
        jobs.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(jobs)
    }

    async fn insert_step(&self, step: &Step) -> EngineResult<()> {
        self.inner.write().await.steps.push(step.clone());
        Ok(())
    }

    async fn update_step(&self, step: &Step) -> EngineResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.steps.iter_mut().find(|s| s.id == step.id) {
            *existing = step.clone();
        }
        Ok(())
    }

    async fn list_steps(&self, job_id: Uuid) -> EngineResult<Vec<Step>> {
        Ok(self
            .inner
            .read()
            .await
            .steps
            .iter()
            .filter(|s| s.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn clear_history(&self) -> EngineResult<u64> {
        let mut inner = self.inner.write().await;
        let removed = inner.jobs.len() as u64;
        inner.jobs.clear();
        inner.steps.clear();
        Ok(removed)
    }
}
