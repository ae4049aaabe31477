//! Domain records the engine reads and writes.

use chrono::{DateTime, Utc};
use runbook_tools::{Block, BlockResult, BlockStatus, CredentialKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job lifecycle: `pending -> running -> {completed | failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

/// Step lifecycle: inserted `running`, updated once to `success` or `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Success,
    Error,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Success => "success",
            StepStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StepStatus::Pending),
            "running" => Ok(StepStatus::Running),
            "success" => Ok(StepStatus::Success),
            "error" => Ok(StepStatus::Error),
            other => Err(format!("unknown step status '{other}'")),
        }
    }
}

impl From<BlockStatus> for StepStatus {
    fn from(status: BlockStatus) -> Self {
        match status {
            BlockStatus::Success => StepStatus::Success,
            BlockStatus::Error => StepStatus::Error,
        }
    }
}

/// One execution attempt of a runbook version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub runbook_id: Uuid,
    pub version_id: Uuid,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Job {
    /// A new job waiting for the worker.
    pub fn pending(runbook_id: Uuid, version_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            runbook_id,
            version_id,
            status: JobStatus::Pending,
            start_time: Utc::now(),
            end_time: None,
        }
    }
}

/// The record of one block's execution within a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: Uuid,
    pub job_id: Uuid,
    pub block_id: Uuid,
    pub status: StepStatus,
    pub output: String,
    pub exit_code: i32,
    pub timestamp: DateTime<Utc>,
}

impl Step {
    /// A step that has started but not finished.
    pub fn running(job_id: Uuid, block_id: Uuid, output: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            block_id,
            status: StepStatus::Running,
            output: output.into(),
            exit_code: -1,
            timestamp: Utc::now(),
        }
    }

    /// Record the block's terminal result.
    pub fn finish(&mut self, result: BlockResult) {
        self.status = result.status.into();
        self.output = result.output;
        self.exit_code = result.exit_code;
    }
}

/// A runbook header. Only `environment_id` matters to execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runbook {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub environment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Runbook {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: None,
            environment_id: None,
            created_at: Utc::now(),
        }
    }
}

/// Immutable snapshot of a runbook's blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunbookVersion {
    pub id: Uuid,
    pub runbook_id: Uuid,
    pub version_number: i32,
    pub blocks: Vec<Block>,
    pub created_at: DateTime<Utc>,
}

impl RunbookVersion {
    pub fn new(runbook_id: Uuid, version_number: i32, blocks: Vec<Block>) -> Self {
        Self {
            id: Uuid::new_v4(),
            runbook_id,
            version_number,
            blocks,
            created_at: Utc::now(),
        }
    }
}

/// A stored credential; the secret stays encrypted at rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub id: Uuid,
    pub name: String,
    pub kind: CredentialKind,
    #[serde(skip_serializing)]
    pub encrypted_secret: String,
    pub created_at: DateTime<Utc>,
}

/// Job status plus its ordered steps.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub steps: Vec<Step>,
}

/// A job row for execution listings.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    #[serde(flatten)]
    pub job: Job,
    pub runbook_title: String,
}
