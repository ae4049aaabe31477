//! Credential queries.

use uuid::Uuid;

use crate::db::models::CredentialRow;
use crate::db::DbPool;
use crate::error::EngineResult;

/// Get a credential by ID.
pub async fn get_credential(pool: &DbPool, id: Uuid) -> EngineResult<Option<CredentialRow>> {
    let row = sqlx::query_as::<_, CredentialRow>(
        r#"
        SELECT id, name, type, encrypted_secret, created_at
        FROM credentials
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
