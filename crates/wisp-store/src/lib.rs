//! Wisp Store - SQLite-backed storage engine for the emulated tree.
//!
//! Provides:
//! - A shared database handle with a batched write pipeline per table
//! - Table schemas and the persisted seed record
//! - The persisted view registry
//! - The in-memory node cache (child seeds and existence maps)

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod cache;
pub mod db;
pub mod queue;
pub mod registry;
pub mod schema;

pub use cache::{CacheStats, CachedNode, NodeCache};
pub use db::Database;
pub use queue::{Batch, OpKind, QueueKind, WriteOp, WriteQueue};
pub use registry::{SecondaryView, ViewRegistry};
pub use schema::SeedInfo;

use thiserror::Error;

/// Errors from storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite error
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Existence map (de)serialization error
    #[error("existence map encoding: {0}")]
    ExistenceMap(#[from] serde_json::Error),
}
