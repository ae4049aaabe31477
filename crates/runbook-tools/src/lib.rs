//! Runbook Tool Library
//!
//! Block model and leaf executors shared by the runbook execution engine.
//!
//! This crate provides:
//! - Typed block model with per-kind configuration
//! - Leaf executors: command (local or containerized), api, ssh, timer, instruction
//! - Secret resolution seam for credential-backed executors
//!
//! Executors never touch persistence. Each one turns a block configuration
//! into a [`BlockResult`].

pub mod block;
pub mod environment;
pub mod error;
pub mod executors;
pub mod result;
pub mod secrets;

pub use block::{Block, BlockSpec};
pub use environment::ExecutionEnvironment;
pub use error::{ExecutorError, SecretError};
pub use executors::{ExecutorSettings, Executors};
pub use result::{BlockResult, BlockStatus};
pub use secrets::{CredentialKind, NoSecrets, Secret, SecretResolver};
