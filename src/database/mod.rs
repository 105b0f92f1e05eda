//! Database module
//!
//! This module provides the database connector, the statement guards, the
//! handle type used by the agent toolkit, and the time-bounded handle cache.

pub mod cache;
pub mod connection;
pub mod manager;
pub mod statement;

// Re-exports
pub use cache::{CacheKey, HandleCache};
pub use connection::{DatabaseBackend, DatabasePool, QueryOutput};
pub use manager::{ConnectOptions, SqlDatabase};
