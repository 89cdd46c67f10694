//! Emulator configuration and validation.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{DEFAULT_BATCH_SIZE, DEFAULT_FLUSH_INTERVAL_MS};

/// Configuration errors surfaced at open.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Primary table name missing
    #[error("primary table name cannot be empty")]
    EmptyPrimaryTable,

    /// Child folder bounds are inverted
    #[error("invalid child folder range: min={min}, max={max}")]
    FolderRange {
        /// Configured minimum
        min: u32,
        /// Configured maximum
        max: u32,
    },

    /// Child file bounds are inverted
    #[error("invalid child file range: min={min}, max={max}")]
    FileRange {
        /// Configured minimum
        min: u32,
        /// Configured maximum
        max: u32,
    },

    /// Depth bounds are inverted or the minimum is below 1
    #[error("invalid depth range: min={min}, max={max}")]
    DepthRange {
        /// Configured minimum
        min: u32,
        /// Configured maximum
        max: u32,
    },

    /// A secondary view has no table name
    #[error("secondary view {key} has an empty table name")]
    EmptySecondaryTable {
        /// Config key of the offending view
        key: String,
    },

    /// Two views share a table name
    #[error("secondary view {key} reuses table name {table}")]
    DuplicateTable {
        /// Config key of the offending view
        key: String,
        /// The duplicated table name
        table: String,
    },

    /// An inclusion probability is outside `[0, 1]`
    #[error("secondary view {key} dst_prob {prob} is outside [0, 1]")]
    ProbOutOfRange {
        /// Config key of the offending view
        key: String,
        /// The invalid probability
        prob: f64,
    },
}

/// Top-level configuration, deserializable from the JSON config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsConfig {
    /// Database location and table layout
    pub database: DatabaseConfig,
}

impl FsConfig {
    /// Applies every validation rule; the first violation wins.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.tables.validate()
    }
}

/// Database location, pipeline tuning, and table layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path of the SQLite database file
    pub path: PathBuf,
    /// Initialize a fresh database when the file is absent
    #[serde(default = "default_true")]
    pub generate_if_not_exists: bool,
    /// Pending operations that mark a write queue ready to flush
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Interval between timed queue flushes, in milliseconds
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// View table layout
    pub tables: TablesConfig,
}

/// The primary view plus any secondary views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TablesConfig {
    /// The canonical view and its generation parameters
    pub primary: PrimaryTreeConfig,
    /// Secondary views keyed by an arbitrary config key.
    ///
    /// Ordered so existence draws and listings are deterministic.
    #[serde(default)]
    pub secondary: BTreeMap<String, SecondaryViewConfig>,
}

impl TablesConfig {
    /// Validates table names, bounds, and probabilities.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let primary = &self.primary;
        if primary.table_name.is_empty() {
            return Err(ConfigError::EmptyPrimaryTable);
        }
        if primary.min_child_folders > primary.max_child_folders {
            return Err(ConfigError::FolderRange {
                min: primary.min_child_folders,
                max: primary.max_child_folders,
            });
        }
        if primary.min_child_files > primary.max_child_files {
            return Err(ConfigError::FileRange {
                min: primary.min_child_files,
                max: primary.max_child_files,
            });
        }
        if primary.min_depth < 1 || primary.min_depth > primary.max_depth {
            return Err(ConfigError::DepthRange {
                min: primary.min_depth,
                max: primary.max_depth,
            });
        }

        let mut seen = std::collections::HashSet::new();
        seen.insert(primary.table_name.as_str());
        for (key, secondary) in &self.secondary {
            if secondary.table_name.is_empty() {
                return Err(ConfigError::EmptySecondaryTable { key: key.clone() });
            }
            if !seen.insert(secondary.table_name.as_str()) {
                return Err(ConfigError::DuplicateTable {
                    key: key.clone(),
                    table: secondary.table_name.clone(),
                });
            }
            if !(0.0..=1.0).contains(&secondary.dst_prob) {
                return Err(ConfigError::ProbOutOfRange {
                    key: key.clone(),
                    prob: secondary.dst_prob,
                });
            }
        }
        Ok(())
    }
}

/// Generation parameters for the canonical tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryTreeConfig {
    /// Backing table name
    pub table_name: String,
    /// Master seed; zero means clock-sourced
    #[serde(default)]
    pub seed: i64,
    /// Minimum folders per folder
    #[serde(default)]
    pub min_child_folders: u32,
    /// Maximum folders per folder
    #[serde(default)]
    pub max_child_folders: u32,
    /// Minimum files per folder
    #[serde(default)]
    pub min_child_files: u32,
    /// Maximum files per folder
    #[serde(default)]
    pub max_child_files: u32,
    /// Minimum bulk-seeded depth
    #[serde(default)]
    pub min_depth: u32,
    /// Maximum bulk-seeded depth
    #[serde(default)]
    pub max_depth: u32,
}

/// A secondary view and its inclusion probability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecondaryViewConfig {
    /// Backing table name
    pub table_name: String,
    /// Probability a node lands in this view, in `[0, 1]`
    pub dst_prob: f64,
}

fn default_true() -> bool {
    true
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_flush_interval_ms() -> u64 {
    DEFAULT_FLUSH_INTERVAL_MS
}
