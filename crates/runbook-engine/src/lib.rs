//! Runbook Execution Engine
//!
//! Runs versioned runbooks as background jobs and records one step per
//! executed block:
//!
//! - **Job Runner**: drives a job through `pending -> running -> completed | failed`
//! - **Block Dispatcher**: routes blocks to executors, evaluates conditions
//!   and runs the chosen branch
//! - **Execution Worker**: polls for pending jobs and survives any failure
//!   inside a single run
//! - **Execution Service**: enqueue, status, stop, history and ad-hoc block runs
//!
//! Leaf block execution lives in the `runbook-tools` crate.
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading from environment variables
//! - [`db`]: PostgreSQL schema, queries and the [`db::PgStore`] backend
//! - [`store`]: Storage traits and the in-memory backend
//! - [`crypto`]: Credential secret encryption
//! - [`handlers`]: HTTP route handlers
//! - [`error`]: Error types with Axum integration
//!
//! ## Example
//!
//! ```ignore
//! use runbook_engine::{db::PgStore, store::Stores};
//!
//! let stores = Stores::shared(Arc::new(PgStore::new(pool)));
//! let dispatcher = BlockDispatcher::new(stores.jobs.clone(), executors);
//! let runner = JobRunner::new(stores.clone(), dispatcher);
//! let outcome = runner.run(&job).await?;
//! ```

pub mod condition;
pub mod config;
pub mod crypto;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod model;
pub mod result_ext;
pub mod runner;
pub mod secrets;
pub mod services;
pub mod state;
pub mod store;
pub mod worker;

pub use dispatcher::BlockDispatcher;
pub use error::{EngineError, EngineResult};
pub use result_ext::ResultExt;
pub use runner::{JobOutcome, JobRunner};
pub use services::ExecutionService;
pub use worker::ExecutionWorker;
