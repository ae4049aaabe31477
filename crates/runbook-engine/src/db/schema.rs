//! Schema bootstrap.

use super::DbPool;

/// Tables used by the engine. Every statement is idempotent.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS execution_environments (
    id          UUID PRIMARY KEY,
    name        TEXT NOT NULL,
    image_tag   TEXT,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS runbooks (
    id              UUID PRIMARY KEY,
    title           TEXT NOT NULL,
    description     TEXT,
    environment_id  UUID REFERENCES execution_environments (id) ON DELETE SET NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS runbook_versions (
    id              UUID PRIMARY KEY,
    runbook_id      UUID NOT NULL REFERENCES runbooks (id) ON DELETE CASCADE,
    version_number  INTEGER NOT NULL,
    blocks          JSONB NOT NULL DEFAULT '[]'::jsonb,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (runbook_id, version_number)
);

CREATE TABLE IF NOT EXISTS credentials (
    id                UUID PRIMARY KEY,
    name              TEXT NOT NULL,
    type              TEXT NOT NULL,
    encrypted_secret  TEXT NOT NULL,
    created_at        TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS execution_jobs (
    id          UUID PRIMARY KEY,
    runbook_id  UUID NOT NULL,
    version_id  UUID NOT NULL,
    status      TEXT NOT NULL,
    start_time  TIMESTAMPTZ NOT NULL,
    end_time    TIMESTAMPTZ
);

CREATE INDEX IF NOT EXISTS execution_jobs_pending_idx
    ON execution_jobs (start_time) WHERE status = 'pending';

CREATE TABLE IF NOT EXISTS execution_steps (
    seq          BIGSERIAL PRIMARY KEY,
    id           UUID NOT NULL UNIQUE,
    job_id       UUID NOT NULL REFERENCES execution_jobs (id) ON DELETE CASCADE,
    block_id     UUID NOT NULL,
    status       TEXT NOT NULL,
    output       TEXT NOT NULL DEFAULT '',
    exit_code    INTEGER NOT NULL DEFAULT -1,
    recorded_at  TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS execution_steps_job_idx ON execution_steps (job_id, seq);
"#;

/// Create the engine's tables if they do not exist.
pub async fn ensure_schema(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    tracing::info!("Database schema ready");
    Ok(())
}
