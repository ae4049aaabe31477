//! Database queries, organized by table.

pub mod credential;
pub mod environment;
pub mod job;
pub mod runbook;
pub mod step;
