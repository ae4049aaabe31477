//! Row models and their conversion into domain records.

use chrono::{DateTime, Utc};
use runbook_tools::{Block, ExecutionEnvironment};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::EngineError;
use crate::model::{Credential, Job, Runbook, RunbookVersion, Step};

#[derive(Debug, Clone, FromRow)]
pub struct RunbookRow {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub environment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<RunbookRow> for Runbook {
    fn from(row: RunbookRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            environment_id: row.environment_id,
            created_at: row.created_at,
        }
    }
}

/// Version row; blocks are stored as JSONB in wire form.
#[derive(Debug, Clone, FromRow)]
pub struct RunbookVersionRow {
    pub id: Uuid,
    pub runbook_id: Uuid,
    pub version_number: i32,
    pub blocks: Json<Vec<Block>>,
    pub created_at: DateTime<Utc>,
}

impl From<RunbookVersionRow> for RunbookVersion {
    fn from(row: RunbookVersionRow) -> Self {
        Self {
            id: row.id,
            runbook_id: row.runbook_id,
            version_number: row.version_number,
            blocks: row.blocks.0,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CredentialRow {
    pub id: Uuid,
    pub name: String,
    /// "ssh" or "api"
    #[sqlx(rename = "type")]
    pub credential_type: String,
    pub encrypted_secret: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<CredentialRow> for Credential {
    type Error = EngineError;

    fn try_from(row: CredentialRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            kind: row.credential_type.parse().map_err(EngineError::Internal)?,
            encrypted_secret: row.encrypted_secret,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct EnvironmentRow {
    pub id: Uuid,
    pub name: String,
    pub image_tag: Option<String>,
}

impl From<EnvironmentRow> for ExecutionEnvironment {
    fn from(row: EnvironmentRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            image_tag: row.image_tag,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub runbook_id: Uuid,
    pub version_id: Uuid,
    pub status: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for Job {
    type Error = EngineError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            runbook_id: row.runbook_id,
            version_id: row.version_id,
            status: row.status.parse().map_err(EngineError::Internal)?,
            start_time: row.start_time,
            end_time: row.end_time,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct StepRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub block_id: Uuid,
    pub status: String,
    pub output: String,
    pub exit_code: i32,
    pub recorded_at: DateTime<Utc>,
}

impl TryFrom<StepRow> for Step {
    type Error = EngineError;

    fn try_from(row: StepRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            job_id: row.job_id,
            block_id: row.block_id,
            status: row.status.parse().map_err(EngineError::Internal)?,
            output: row.output,
            exit_code: row.exit_code,
            timestamp: row.recorded_at,
        })
    }
}
