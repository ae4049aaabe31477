//! Service layer.
//!
//! Services hold the operations exposed to HTTP handlers and the CLI.

pub mod execution;

pub use execution::ExecutionService;
