//! Execution step queries.

use uuid::Uuid;

use crate::db::models::StepRow;
use crate::db::DbPool;
use crate::error::EngineResult;
use crate::model::Step;

/// Insert a new step. `seq` is assigned by the database.
pub async fn insert_step(pool: &DbPool, step: &Step) -> EngineResult<()> {
    sqlx::query(
        r#"
        INSERT INTO execution_steps (id, job_id, block_id, status, output, exit_code, recorded_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(step.id)
    .bind(step.job_id)
    .bind(step.block_id)
    .bind(step.status.as_str())
    .bind(&step.output)
    .bind(step.exit_code)
    .bind(step.timestamp)
    .execute(pool)
    .await?;

    Ok(())
}

/// Update a step's terminal fields.
pub async fn update_step(pool: &DbPool, step: &Step) -> EngineResult<()> {
    sqlx::query(
        r#"
        UPDATE execution_steps
        SET status = $2, output = $3, exit_code = $4
        WHERE id = $1
        "#,
    )
    .bind(step.id)
    .bind(step.status.as_str())
    .bind(&step.output)
    .bind(step.exit_code)
    .execute(pool)
    .await?;

    Ok(())
}

/// List a job's steps in dispatch order.
pub async fn list_steps(pool: &DbPool, job_id: Uuid) -> EngineResult<Vec<StepRow>> {
    let rows = sqlx::query_as::<_, StepRow>(
        r#"
        SELECT id, job_id, block_id, status, output, exit_code, recorded_at
        FROM execution_steps
        WHERE job_id = $1
        ORDER BY seq ASC
        "#,
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
