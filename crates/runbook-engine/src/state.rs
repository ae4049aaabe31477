//! Shared application state handed to HTTP handlers.

use std::time::Instant;

use crate::db::DbPool;
use crate::services::ExecutionService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub executions: ExecutionService,

    /// `None` when the engine runs without PostgreSQL.
    pub db: Option<DbPool>,

    pub start_time: Instant,
}

impl AppState {
    pub fn new(executions: ExecutionService, db: Option<DbPool>) -> Self {
        Self {
            executions,
            db,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
