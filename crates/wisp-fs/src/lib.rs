//! Wisp FS - the filesystem-shaped API over the emulated tree.
//!
//! Provides:
//! - The deterministic child generator (lazy materialization)
//! - The bulk seeder (eager materialization)
//! - The `Core` capability trait and its `MockFs` implementation

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod core;
pub mod generator;
pub mod seeder;

pub use crate::core::{Core, MockFs};
pub use generator::{node_from_row, Generator};
pub use seeder::{SeedSummary, Seeder};

use std::path::PathBuf;

use thiserror::Error;
use wisp_core::config::ConfigError;
use wisp_store::StoreError;

/// Errors surfaced by the filesystem API.
#[derive(Debug, Error)]
pub enum FsError {
    /// Configuration failed validation
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The database file is absent and generation is disabled
    #[error("database not found: {0}")]
    DatabaseMissing(PathBuf),

    /// The supplied view id is not registered
    #[error("unknown view: {0}")]
    ViewUnknown(String),

    /// A node lookup returned no row
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// Child materialization or persistence failed
    #[error("generation failed: {0}")]
    Generation(#[from] StoreError),
}
