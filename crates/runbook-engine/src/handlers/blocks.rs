//! Ad-hoc block execution.

use axum::{extract::State, Json};
use runbook_tools::{Block, BlockResult};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::services::ExecutionService;

/// Request for running a single block.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteBlockRequest {
    pub block: Block,
    #[serde(default)]
    pub environment_id: Option<Uuid>,
}

/// Run one block without recording a job.
///
/// POST /api/blocks/execute
pub async fn execute(
    State(service): State<ExecutionService>,
    Json(request): Json<ExecuteBlockRequest>,
) -> EngineResult<Json<BlockResult>> {
    let result = service
        .run_single_block(&request.block, request.environment_id)
        .await?;
    Ok(Json(result))
}
