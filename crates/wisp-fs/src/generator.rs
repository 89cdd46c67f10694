//! Deterministic child generation.
//!
//! A folder's children are a pure function of its child seed: shape draws
//! (folder count, file count, file sizes) come from an RNG seeded by the
//! folder's seed, child identities are SHA-256 derivations, and each child's
//! secondary-view membership is drawn from the child's own seed. The draw
//! order is fixed: folder count first, then file count, then one size per
//! file in index order. Re-materializing the same folder reproduces the
//! same rows, and inserts are ignore-on-conflict, so repeats are idempotent.

use std::ops::RangeInclusive;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::types::Value;
use rusqlite::Row;
use tracing::debug;

use wisp_core::config::PrimaryTreeConfig;
use wisp_core::{derive_child_seed, derive_node_id, join_path, ExistenceMap, Node, NodeKind};
use wisp_store::{CachedNode, Database, NodeCache, StoreError, ViewRegistry};

use crate::FsError;

/// Generated file sizes fall in this inclusive range, in bytes.
const FILE_SIZE_RANGE: RangeInclusive<i64> = 100..=999;

/// Maps a `SELECT id, parent_id, name, path, type, size, level, checked`
/// row to a [`Node`].
pub fn node_from_row(row: &Row<'_>) -> rusqlite::Result<Node> {
    let kind: String = row.get(4)?;
    let kind = NodeKind::parse(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown node type: {}", kind).into(),
        )
    })?;
    Ok(Node {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        name: row.get(2)?,
        path: row.get(3)?,
        kind,
        size: row.get(5)?,
        level: row.get(6)?,
        checked: row.get(7)?,
    })
}

/// Generates and persists folder children deterministically.
pub struct Generator {
    db: Arc<Database>,
    registry: Arc<ViewRegistry>,
    cache: Arc<NodeCache>,
    config: PrimaryTreeConfig,
    master_seed: i64,
}

impl Generator {
    /// Creates a generator over the given database and registry.
    pub fn new(
        db: Arc<Database>,
        registry: Arc<ViewRegistry>,
        cache: Arc<NodeCache>,
        config: PrimaryTreeConfig,
        master_seed: i64,
    ) -> Self {
        Self {
            db,
            registry,
            cache,
            config,
            master_seed,
        }
    }

    /// Fetches a folder's row from the given view's table.
    ///
    /// Fails with `NodeNotFound` when the folder does not exist in that
    /// view, including folders excluded from a secondary view.
    pub async fn folder_info(&self, folder_id: &str, table: &str) -> Result<Node, FsError> {
        let sql = format!(
            "SELECT id, parent_id, name, path, type, size, level, checked \
             FROM {} WHERE id = ?1 LIMIT 1",
            table
        );
        let node = self
            .db
            .query_row_opt(table, &sql, vec![Value::from(folder_id.to_string())], node_from_row)
            .await?;
        node.ok_or_else(|| FsError::NodeNotFound(folder_id.to_string()))
    }

    /// Generates, persists, and returns the children of a folder.
    pub async fn generate_children(
        &self,
        folder_id: &str,
        folder_path: &str,
        level: i64,
        folders_only: bool,
    ) -> Result<Vec<Node>, FsError> {
        let parent = self.cached_node_for(folder_id).await?;
        let mut rng = StdRng::seed_from_u64(parent.child_seed as u64);

        let mut children = Vec::new();

        // All folder draws precede all file draws; the index order fixes the
        // RNG sequence.
        let folders = rng.gen_range(self.config.min_child_folders..=self.config.max_child_folders);
        for i in 0..folders {
            let name = format!("folder_{}", i);
            let id = derive_node_id(parent.child_seed, &name);
            let path = join_path(folder_path, &name);
            children.push(Node {
                id,
                parent_id: folder_id.to_string(),
                name,
                path,
                kind: NodeKind::Folder,
                size: 0,
                level: level + 1,
                checked: false,
            });
        }

        if !folders_only {
            let files = rng.gen_range(self.config.min_child_files..=self.config.max_child_files);
            for i in 0..files {
                let name = format!("file_{}.txt", i);
                let id = derive_node_id(parent.child_seed, &name);
                let path = join_path(folder_path, &name);
                let size = rng.gen_range(FILE_SIZE_RANGE);
                children.push(Node {
                    id,
                    parent_id: folder_id.to_string(),
                    name,
                    path,
                    kind: NodeKind::File,
                    size,
                    level: level + 1,
                    checked: false,
                });
            }
        }

        self.persist_children(&children, &parent.existence)?;
        debug!(
            folder = folder_id,
            count = children.len(),
            "materialized children"
        );
        Ok(children)
    }

    /// Queues the `checked` flag update for a listed folder.
    pub fn mark_accessed(&self, folder_id: &str, table: &str) {
        let sql = format!("UPDATE {} SET checked = 1 WHERE id = ?1", table);
        self.db
            .queue_update(table, "", &sql, vec![Value::from(folder_id.to_string())]);
    }

    /// Bulk-loads the cache from the primary table. Returns the number of
    /// entries loaded.
    pub async fn load_cache(&self) -> Result<usize, FsError> {
        let primary = self.registry.primary_table();
        let sql = format!(
            "SELECT id, child_seed, existence_map FROM {} WHERE child_seed IS NOT NULL",
            primary
        );
        let rows = self
            .db
            .query_rows(primary, &sql, Vec::new(), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })
            .await?;

        let loaded = rows.len();
        for (id, child_seed, existence_json) in rows {
            let existence = match existence_json {
                Some(json) => ExistenceMap::from_json(&json).map_err(StoreError::from)?,
                None => ExistenceMap::default(),
            };
            self.cache.insert(
                id,
                CachedNode {
                    child_seed,
                    existence,
                },
            );
        }
        Ok(loaded)
    }

    /// Returns the combined cache entry for a folder, reading the primary
    /// row on a cache miss and deriving (and queueing) the child seed when
    /// the row has none yet.
    async fn cached_node_for(&self, folder_id: &str) -> Result<CachedNode, FsError> {
        if let Some(cached) = self.cache.get(folder_id) {
            return Ok(cached);
        }

        let primary = self.registry.primary_table();
        let sql = format!(
            "SELECT child_seed, existence_map FROM {} WHERE id = ?1 LIMIT 1",
            primary
        );
        let row = self
            .db
            .query_row_opt(primary, &sql, vec![Value::from(folder_id.to_string())], |row| {
                Ok((
                    row.get::<_, Option<i64>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                ))
            })
            .await?;
        let (seed_column, existence_json) =
            row.ok_or_else(|| FsError::NodeNotFound(folder_id.to_string()))?;

        let existence = match existence_json {
            Some(json) => ExistenceMap::from_json(&json).map_err(StoreError::from)?,
            None => ExistenceMap::default(),
        };
        let child_seed = match seed_column {
            Some(seed) => seed,
            None => {
                let seed = derive_child_seed(self.master_seed, folder_id);
                let sql = format!("UPDATE {} SET child_seed = ?1 WHERE id = ?2", primary);
                self.db.queue_update(
                    primary,
                    "",
                    &sql,
                    vec![Value::from(seed), Value::from(folder_id.to_string())],
                );
                seed
            }
        };

        let cached = CachedNode {
            child_seed,
            existence,
        };
        self.cache.insert(folder_id.to_string(), cached.clone());
        Ok(cached)
    }

    /// Draws a node's secondary-view membership from its own seed. Views
    /// are visited in configuration order, so the draws are reproducible.
    fn draw_existence(&self, child_seed: i64) -> ExistenceMap {
        let mut rng = StdRng::seed_from_u64(child_seed as u64);
        let mut map = ExistenceMap::new();
        for view in self.registry.secondaries() {
            let roll: f64 = rng.gen();
            map.set(&view.info.table_name, roll < view.inclusion_prob);
        }
        map
    }

    /// Queues every child into the primary table and into each secondary
    /// table its existence map selects, then caches the children.
    fn persist_children(
        &self,
        children: &[Node],
        parent_existence: &ExistenceMap,
    ) -> Result<(), FsError> {
        let primary = self.registry.primary_table();
        let primary_sql = format!(
            "INSERT OR IGNORE INTO {} \
             (id, parent_id, name, path, type, size, level, checked, existence_map, child_seed) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            primary
        );

        for child in children {
            let child_seed = derive_child_seed(self.master_seed, &child.id);
            let existence = self.draw_existence(child_seed).and(parent_existence);
            let existence_json = existence.to_json().map_err(StoreError::from)?;

            self.db.queue_write(
                primary,
                &primary_sql,
                vec![
                    Value::from(child.id.clone()),
                    Value::from(child.parent_id.clone()),
                    Value::from(child.name.clone()),
                    Value::from(child.path.clone()),
                    Value::from(child.kind.as_str().to_string()),
                    Value::from(child.size),
                    Value::from(child.level),
                    Value::from(child.checked),
                    Value::from(existence_json),
                    Value::from(child_seed),
                ],
            );

            for view in self.registry.secondaries() {
                if !existence.contains(&view.info.table_name) {
                    continue;
                }
                let sql = format!(
                    "INSERT OR IGNORE INTO {} \
                     (id, parent_id, name, path, type, size, level, checked, child_seed) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    view.info.table_name
                );
                self.db.queue_write(
                    &view.info.table_name,
                    &sql,
                    vec![
                        Value::from(child.id.clone()),
                        Value::from(child.parent_id.clone()),
                        Value::from(child.name.clone()),
                        Value::from(child.path.clone()),
                        Value::from(child.kind.as_str().to_string()),
                        Value::from(child.size),
                        Value::from(child.level),
                        Value::from(child.checked),
                        Value::from(child_seed),
                    ],
                );
            }

            self.cache.insert(
                child.id.clone(),
                CachedNode {
                    child_seed,
                    existence,
                },
            );
        }
        Ok(())
    }
}
