//! Execution management API handlers.
//!
//! Starting runbooks, listing jobs, status, stop control and history cleanup.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::model::{JobReport, JobStatus, JobSummary};
use crate::services::ExecutionService;

/// Optional body for starting a runbook.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartExecutionRequest {
    /// Defaults to the latest version.
    pub version_id: Option<Uuid>,
}

/// Response for an accepted execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartExecutionResponse {
    pub job_id: Uuid,
}

/// Request for controlling a running execution.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlRequest {
    pub action: String,
}

/// Response for an accepted control action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub message: String,
}

/// Enqueue a runbook for execution.
///
/// POST /api/runbooks/{runbook_id}/execute
pub async fn start(
    State(service): State<ExecutionService>,
    Path(runbook_id): Path<Uuid>,
    request: Option<Json<StartExecutionRequest>>,
) -> EngineResult<(StatusCode, Json<StartExecutionResponse>)> {
    let request = request.map(|Json(r)| r).unwrap_or_default();

    let job = match request.version_id {
        Some(version_id) => service.enqueue(runbook_id, version_id).await?,
        None => service.enqueue_latest(runbook_id).await?,
    };

    Ok((
        StatusCode::ACCEPTED,
        Json(StartExecutionResponse { job_id: job.id }),
    ))
}

/// List executions, newest first.
///
/// GET /api/executions
pub async fn list(State(service): State<ExecutionService>) -> EngineResult<Json<Vec<JobSummary>>> {
    Ok(Json(service.list_executions().await?))
}

/// Execution status with its steps.
///
/// GET /api/executions/{job_id}
pub async fn get(
    State(service): State<ExecutionService>,
    Path(job_id): Path<Uuid>,
) -> EngineResult<Json<JobReport>> {
    Ok(Json(service.get_status(job_id).await?))
}

/// Control an execution. Only `stop` is supported.
///
/// POST /api/executions/{job_id}/control
pub async fn control(
    State(service): State<ExecutionService>,
    Path(job_id): Path<Uuid>,
    Json(request): Json<ControlRequest>,
) -> EngineResult<(StatusCode, Json<ControlResponse>)> {
    if request.action != "stop" {
        return Err(EngineError::BadRequest(format!(
            "Unsupported action '{}'",
            request.action
        )));
    }

    let job = service.request_stop(job_id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ControlResponse {
            job_id: job.id,
            status: job.status,
            message: "Stop requested".to_string(),
        }),
    ))
}

/// Delete all execution history.
///
/// DELETE /api/executions/clear
pub async fn clear(State(service): State<ExecutionService>) -> EngineResult<StatusCode> {
    service.clear_history().await?;
    Ok(StatusCode::NO_CONTENT)
}
