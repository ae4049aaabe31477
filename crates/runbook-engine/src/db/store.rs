//! PostgreSQL implementation of the storage traits.

use async_trait::async_trait;
use runbook_tools::ExecutionEnvironment;
use uuid::Uuid;

use super::queries;
use super::DbPool;
use crate::error::EngineResult;
use crate::model::{Credential, Job, JobStatus, Runbook, RunbookVersion, Step};
use crate::store::{CredentialStore, EnvironmentStore, JobStore, RunbookStore};

/// Store over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    db: DbPool,
}

impl PgStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &DbPool {
        &self.db
    }
}

#[async_trait]
impl RunbookStore for PgStore {
    async fn get_runbook(&self, id: Uuid) -> EngineResult<Option<Runbook>> {
        Ok(queries::runbook::get_runbook(&self.db, id)
            .await?
            .map(Into::into))
    }

    async fn get_version(&self, id: Uuid) -> EngineResult<Option<RunbookVersion>> {
        Ok(queries::runbook::get_version(&self.db, id)
            .await?
            .map(Into::into))
    }

    async fn latest_version(&self, runbook_id: Uuid) -> EngineResult<Option<RunbookVersion>> {
        Ok(queries::runbook::get_latest_version(&self.db, runbook_id)
            .await?
            .map(Into::into))
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn get_credential(&self, id: Uuid) -> EngineResult<Option<Credential>> {
        queries::credential::get_credential(&self.db, id)
            .await?
            .map(Credential::try_from)
            .transpose()
    }
}

#[async_trait]
impl EnvironmentStore for PgStore {
    async fn get_environment(&self, id: Uuid) -> EngineResult<Option<ExecutionEnvironment>> {
        Ok(queries::environment::get_environment(&self.db, id)
            .await?
            .map(Into::into))
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn insert_job(&self, job: &Job) -> EngineResult<()> {
        queries::job::insert_job(&self.db, job).await
    }

    async fn get_job(&self, id: Uuid) -> EngineResult<Option<Job>> {
        queries::job::get_job(&self.db, id)
            .await?
            .map(Job::try_from)
            .transpose()
    }

    async fn next_pending_job(&self) -> EngineResult<Option<Job>> {
        queries::job::get_next_pending(&self.db)
            .await?
            .map(Job::try_from)
            .transpose()
    }

    async fn transition_job(
        &self,
        id: Uuid,
        allowed_from: &[JobStatus],
        to: JobStatus,
    ) -> EngineResult<Option<Job>> {
        queries::job::transition(&self.db, id, allowed_from, to)
            .await?
            .map(Job::try_from)
            .transpose()
    }

    async fn list_jobs(&self) -> EngineResult<Vec<Job>> {
        queries::job::list_jobs(&self.db)
            .await?
            .into_iter()
            .map(Job::try_from)
            .collect()
    }

    async fn insert_step(&self, step: &Step) -> EngineResult<()> {
        queries::step::insert_step(&self.db, step).await
    }

    async fn update_step(&self, step: &Step) -> EngineResult<()> {
        queries::step::update_step(&self.db, step).await
    }

    async fn list_steps(&self, job_id: Uuid) -> EngineResult<Vec<Step>> {
        queries::step::list_steps(&self.db, job_id)
            .await?
            .into_iter()
            .map(Step::try_from)
            .collect()
    }

    async fn clear_history(&self) -> EngineResult<u64> {
        queries::job::delete_all(&self.db).await
    }
}
