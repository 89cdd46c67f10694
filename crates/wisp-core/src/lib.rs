//! Wisp Core - Core types for the mock filesystem emulator.
//!
//! This crate provides:
//! - Configuration structures and validation
//! - The node model (files, folders, paths, levels)
//! - View identifiers and descriptors
//! - Secondary-view existence maps
//! - Deterministic seed and identifier derivation

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
pub mod existence;
pub mod node;
pub mod seed;
pub mod view;

pub use config::{ConfigError, DatabaseConfig, FsConfig, PrimaryTreeConfig, SecondaryViewConfig};
pub use existence::ExistenceMap;
pub use node::{join_path, Node, NodeKind};
pub use seed::{derive_child_seed, derive_node_id, derive_root_id, resolve_master_seed};
pub use view::{ViewId, ViewInfo, ViewKind};

/// Default number of pending operations that marks a write queue ready to flush.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default interval between timed queue flushes, in milliseconds.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 100;
