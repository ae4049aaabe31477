//! Execution job queries.

use uuid::Uuid;

use crate::db::models::JobRow;
use crate::db::DbPool;
use crate::error::EngineResult;
use crate::model::{Job, JobStatus};

/// Insert a new job.
pub async fn insert_job(pool: &DbPool, job: &Job) -> EngineResult<()> {
    sqlx::query(
        r#"
        INSERT INTO execution_jobs (id, runbook_id, version_id, status, start_time, end_time)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(job.id)
    .bind(job.runbook_id)
    .bind(job.version_id)
    .bind(job.status.as_str())
    .bind(job.start_time)
    .bind(job.end_time)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a job by ID.
pub async fn get_job(pool: &DbPool, id: Uuid) -> EngineResult<Option<JobRow>> {
    let row = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, runbook_id, version_id, status, start_time, end_time
        FROM execution_jobs
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Get the oldest pending job.
pub async fn get_next_pending(pool: &DbPool) -> EngineResult<Option<JobRow>> {
    let row = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, runbook_id, version_id, status, start_time, end_time
        FROM execution_jobs
        WHERE status = 'pending'
        ORDER BY start_time ASC
        LIMIT 1
        "#,
    )
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Compare-and-set a job's status in one statement.
pub async fn transition(
    pool: &DbPool,
    id: Uuid,
    allowed_from: &[JobStatus],
    to: JobStatus,
) -> EngineResult<Option<JobRow>> {
    let from: Vec<String> = allowed_from.iter().map(|s| s.as_str().to_string()).collect();

    let row = sqlx::query_as::<_, JobRow>(
        r#"
        UPDATE execution_jobs
        SET status = $3,
            end_time = CASE WHEN $4 THEN NOW() ELSE end_time END
        WHERE id = $1 AND status = ANY($2)
        RETURNING id, runbook_id, version_id, status, start_time, end_time
        "#,
    )
    .bind(id)
    .bind(from)
    .bind(to.as_str())
    .bind(to.is_terminal())
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// List all jobs, newest first.
pub async fn list_jobs(pool: &DbPool) -> EngineResult<Vec<JobRow>> {
    let rows = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, runbook_id, version_id, status, start_time, end_time
        FROM execution_jobs
        ORDER BY start_time DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Delete every job and step. Returns the number of jobs deleted.
pub async fn delete_all(pool: &DbPool) -> EngineResult<u64> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM execution_steps")
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM execution_jobs")
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(result.rows_affected())
}
