//! Runbook and version queries.

use uuid::Uuid;

use crate::db::models::{RunbookRow, RunbookVersionRow};
use crate::db::DbPool;
use crate::error::EngineResult;

/// Get a runbook by ID.
pub async fn get_runbook(pool: &DbPool, id: Uuid) -> EngineResult<Option<RunbookRow>> {
    let row = sqlx::query_as::<_, RunbookRow>(
        r#"
        SELECT id, title, description, environment_id, created_at
        FROM runbooks
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Get a runbook version by ID.
pub async fn get_version(pool: &DbPool, id: Uuid) -> EngineResult<Option<RunbookVersionRow>> {
    let row = sqlx::query_as::<_, RunbookVersionRow>(
        r#"
        SELECT id, runbook_id, version_number, blocks, created_at
        FROM runbook_versions
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Get the highest-numbered version of a runbook.
pub async fn get_latest_version(
    pool: &DbPool,
    runbook_id: Uuid,
) -> EngineResult<Option<RunbookVersionRow>> {
    let row = sqlx::query_as::<_, RunbookVersionRow>(
        r#"
        SELECT id, runbook_id, version_number, blocks, created_at
        FROM runbook_versions
        WHERE runbook_id = $1
        ORDER BY version_number DESC
        LIMIT 1
        "#,
    )
    .bind(runbook_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
