//! Shared harness for end-to-end emulator tests.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tempfile::TempDir;
use wisp_core::config::{
    DatabaseConfig, FsConfig, PrimaryTreeConfig, SecondaryViewConfig, TablesConfig,
};
use wisp_core::{Node, ViewId};
use wisp_fs::{node_from_row, Core, MockFs};

/// Shape parameters for a test tree.
#[derive(Debug, Clone)]
pub struct TreeSpec {
    /// Master seed; zero means clock-sourced
    pub seed: i64,
    /// (min, max) folders per folder
    pub folders: (u32, u32),
    /// (min, max) files per folder
    pub files: (u32, u32),
    /// (min, max) bulk-seeded depth
    pub depth: (u32, u32),
    /// Secondary views as (table_name, dst_prob)
    pub secondaries: Vec<(&'static str, f64)>,
    /// Write-queue batch size
    pub batch_size: usize,
    /// Write-queue flush interval, in milliseconds
    pub flush_interval_ms: u64,
}

impl Default for TreeSpec {
    fn default() -> Self {
        Self {
            seed: 42,
            folders: (2, 2),
            files: (1, 1),
            depth: (2, 2),
            secondaries: Vec::new(),
            batch_size: 1000,
            flush_interval_ms: 100,
        }
    }
}

impl TreeSpec {
    /// Builds a full configuration over the given database path.
    pub fn config(&self, path: PathBuf) -> FsConfig {
        let mut secondary = BTreeMap::new();
        for (table_name, dst_prob) in &self.secondaries {
            secondary.insert(
                table_name.to_string(),
                SecondaryViewConfig {
                    table_name: table_name.to_string(),
                    dst_prob: *dst_prob,
                },
            );
        }

        FsConfig {
            database: DatabaseConfig {
                path,
                generate_if_not_exists: true,
                batch_size: self.batch_size,
                flush_interval_ms: self.flush_interval_ms,
                tables: TablesConfig {
                    primary: PrimaryTreeConfig {
                        table_name: "nodes".to_string(),
                        seed: self.seed,
                        min_child_folders: self.folders.0,
                        max_child_folders: self.folders.1,
                        min_child_files: self.files.0,
                        max_child_files: self.files.1,
                        min_depth: self.depth.0,
                        max_depth: self.depth.1,
                    },
                    secondary,
                },
            },
        }
    }
}

/// An open emulator over a temp-dir database.
pub struct TestFs {
    /// The open handle
    pub fs: MockFs,
    /// The configuration used to open it
    pub config: FsConfig,
    dir: TempDir,
}

impl TestFs {
    /// Opens a fresh emulator with the given tree shape.
    pub async fn open(spec: &TreeSpec) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let config = spec.config(dir.path().join("emulator.db"));
        let fs = MockFs::open(config.clone()).await.expect("open emulator");
        Self { fs, config, dir }
    }

    /// Closes and reopens the same database, simulating a process restart.
    pub async fn reopen(self) -> Self {
        self.fs.close().await;
        let fs = MockFs::open(self.config.clone())
            .await
            .expect("reopen emulator");
        Self {
            fs,
            config: self.config,
            dir: self.dir,
        }
    }

    /// The primary view's table name.
    pub fn primary_table(&self) -> &str {
        self.fs.registry().primary_table()
    }

    /// The primary view's id.
    pub fn primary_view(&self) -> ViewId {
        self.fs.registry().primary().view_id.clone()
    }

    /// Resolves a table name to its view id.
    pub fn view_for(&self, table: &str) -> ViewId {
        self.fs
            .registry()
            .view_for_table(table)
            .expect("view for table")
            .clone()
    }

    /// All rows of a table ordered by path. The read drains the queue.
    pub async fn rows(&self, table: &str) -> Vec<Node> {
        let sql = format!(
            "SELECT id, parent_id, name, path, type, size, level, checked \
             FROM {} ORDER BY path",
            table
        );
        self.fs
            .database()
            .query_rows(table, &sql, Vec::new(), node_from_row)
            .await
            .expect("read rows")
    }

    /// Row count of a table. The read drains the queue.
    pub async fn row_count(&self, table: &str) -> u64 {
        let stats = self.fs.table_stats().await.expect("table stats");
        *stats.get(table).expect("table in stats")
    }

    /// Recursively materializes the primary view down to `depth`, returning
    /// every node seen (the root included). Folders at `depth` are rows but
    /// are not expanded.
    pub async fn expand_to_depth(&self, depth: i64) -> Vec<Node> {
        let view = self.primary_view();
        let root = self.fs.get_root(&view).await.expect("root");
        let mut all = vec![root.clone()];
        let mut frontier = vec![root];

        while let Some(folder) = frontier.pop() {
            if !folder.is_folder() || folder.level >= depth {
                continue;
            }
            let children = self
                .fs
                .list_children(&view, &folder.id, false)
                .await
                .expect("list children");
            all.extend(children.iter().cloned());
            frontier.extend(children.into_iter().filter(Node::is_folder));
        }
        all
    }
}
