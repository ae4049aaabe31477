//! Execution environment queries.

use uuid::Uuid;

use crate::db::models::EnvironmentRow;
use crate::db::DbPool;
use crate::error::EngineResult;

/// Get an execution environment by ID.
pub async fn get_environment(pool: &DbPool, id: Uuid) -> EngineResult<Option<EnvironmentRow>> {
    let row = sqlx::query_as::<_, EnvironmentRow>(
        r#"
        SELECT id, name, image_tag
        FROM execution_environments
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
