//! Configuration for the runbook engine.
//!
//! Loaded from environment variables with `envy`; a `.env` file is read by
//! the binary before anything else.

mod database;
mod engine;

pub use database::DatabaseConfig;
pub use engine::{EngineConfig, LogFormat};
