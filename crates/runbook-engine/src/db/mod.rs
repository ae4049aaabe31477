//! PostgreSQL persistence.
//!
//! Connection pool, schema bootstrap, row models, queries and the
//! [`PgStore`] that implements the storage traits on top of them.

pub mod models;
pub mod pool;
pub mod queries;
pub mod schema;
pub mod store;

pub use pool::{create_pool, health_check, DbPool};
pub use schema::ensure_schema;
pub use store::PgStore;
