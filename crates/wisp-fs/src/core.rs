//! The core capability interface and its database-backed implementation.
//!
//! Presentational layers (HTTP routes, SDK wrappers) depend on the [`Core`]
//! trait, not on any concrete handle shape.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::Value;
use tracing::{debug, info};

use wisp_core::config::FsConfig;
use wisp_core::{
    derive_child_seed, derive_root_id, resolve_master_seed, ExistenceMap, Node, ViewId, ViewInfo,
};
use wisp_store::{
    schema, CacheStats, CachedNode, Database, NodeCache, QueueKind, SeedInfo, StoreError,
    ViewRegistry,
};

use crate::generator::{node_from_row, Generator};
use crate::seeder::{SeedSummary, Seeder};
use crate::FsError;

/// The narrow interface presentational layers consume.
#[async_trait]
pub trait Core: Send + Sync {
    /// Lists every configured view.
    async fn list_views(&self) -> Vec<ViewInfo>;

    /// Returns the root node of a view.
    async fn get_root(&self, view_id: &ViewId) -> Result<Node, FsError>;

    /// Lists a folder's children, materializing them on first access.
    /// Marks the folder `checked` as a side effect.
    async fn list_children(
        &self,
        view_id: &ViewId,
        folder_id: &str,
        folders_only: bool,
    ) -> Result<Vec<Node>, FsError>;

    /// Node-cache statistics.
    async fn cache_stats(&self) -> CacheStats;

    /// Drops every node-cache entry.
    async fn clear_cache(&self);

    /// Row counts per view table, after draining each table's queue.
    async fn table_stats(&self) -> Result<BTreeMap<String, u64>, FsError>;
}

/// Database-backed mock filesystem handle.
pub struct MockFs {
    db: Arc<Database>,
    registry: Arc<ViewRegistry>,
    cache: Arc<NodeCache>,
    generator: Generator,
    config: FsConfig,
    master_seed: i64,
}

impl MockFs {
    /// Validates the configuration and opens the emulated filesystem,
    /// initializing a fresh database when none exists yet.
    pub async fn open(config: FsConfig) -> Result<Self, FsError> {
        config.validate()?;

        let database = &config.database;
        if !database.path.exists() && !database.generate_if_not_exists {
            return Err(FsError::DatabaseMissing(database.path.clone()));
        }

        let db = Arc::new(Database::open(&database.path)?);
        schema::create_registry_tables(&db).await?;

        let tables = &database.tables;
        db.create_table(&tables.primary.table_name, &schema::nodes_table_schema(true))
            .await?;
        for secondary in tables.secondary.values() {
            db.create_table(&secondary.table_name, &schema::nodes_table_schema(false))
                .await?;
        }

        let registry = Arc::new(ViewRegistry::open(&db, tables).await?);

        let flush_interval = Duration::from_millis(database.flush_interval_ms);
        for table in registry.table_names() {
            db.register_queue(&table, QueueKind::Node, database.batch_size, flush_interval);
        }

        // A persisted seed always wins over the configured one; the tree is
        // already derived from it.
        let persisted = SeedInfo::load(&db).await?;
        let master_seed = match persisted {
            Some(info) => info.seed_value,
            None => resolve_master_seed(tables.primary.seed),
        };

        let cache = Arc::new(NodeCache::new());
        let generator = Generator::new(
            Arc::clone(&db),
            Arc::clone(&registry),
            Arc::clone(&cache),
            tables.primary.clone(),
            master_seed,
        );

        let fs = Self {
            db,
            registry,
            cache,
            generator,
            config,
            master_seed,
        };

        if persisted.is_some() {
            let loaded = fs.generator.load_cache().await?;
            debug!(loaded, "bulk-loaded node cache");
        } else {
            SeedInfo::save(&fs.db, master_seed, fs.config.database.tables.primary.max_depth)
                .await?;
            fs.insert_root().await?;
            info!(seed = master_seed, "initialized fresh database");
        }

        Ok(fs)
    }

    /// Drains every queue and stops the background flushers.
    pub async fn close(&self) {
        self.db.close().await;
    }

    /// Runs the bulk seeder, materializing the whole tree eagerly.
    pub async fn bulk_seed(&self) -> Result<SeedSummary, FsError> {
        let seeder = Seeder::new(
            &self.db,
            &self.generator,
            &self.config.database.tables.primary,
            self.registry.primary_table(),
            self.master_seed,
        );
        seeder.run().await
    }

    /// The effective master seed.
    pub fn master_seed(&self) -> i64 {
        self.master_seed
    }

    /// The underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// The view registry.
    pub fn registry(&self) -> &ViewRegistry {
        &self.registry
    }

    fn resolve_table(&self, view_id: &ViewId) -> Result<String, FsError> {
        self.registry
            .table_for(view_id)
            .map(str::to_string)
            .ok_or_else(|| FsError::ViewUnknown(view_id.to_string()))
    }

    /// Inserts the root row into every view. The root exists in all
    /// secondary views unconditionally.
    async fn insert_root(&self) -> Result<(), FsError> {
        let root_id = derive_root_id(self.master_seed);
        let root_seed = derive_child_seed(self.master_seed, &root_id);
        let existence = ExistenceMap::all_true(self.registry.secondary_table_names());
        let existence_json = existence.to_json().map_err(StoreError::from)?;

        let primary = self.registry.primary_table();
        let sql = format!(
            "INSERT OR IGNORE INTO {} \
             (id, parent_id, name, path, type, size, level, checked, existence_map, child_seed) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            primary
        );
        self.db
            .exec(
                &sql,
                vec![
                    Value::from(root_id.clone()),
                    Value::from(String::new()),
                    Value::from("root".to_string()),
                    Value::from("/".to_string()),
                    Value::from("folder".to_string()),
                    Value::from(0i64),
                    Value::from(0i64),
                    Value::from(false),
                    Value::from(existence_json),
                    Value::from(root_seed),
                ],
            )
            .await?;

        for view in self.registry.secondaries() {
            let sql = format!(
                "INSERT OR IGNORE INTO {} \
                 (id, parent_id, name, path, type, size, level, checked, child_seed) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                view.info.table_name
            );
            self.db
                .exec(
                    &sql,
                    vec![
                        Value::from(root_id.clone()),
                        Value::from(String::new()),
                        Value::from("root".to_string()),
                        Value::from("/".to_string()),
                        Value::from("folder".to_string()),
                        Value::from(0i64),
                        Value::from(0i64),
                        Value::from(false),
                        Value::from(root_seed),
                    ],
                )
                .await?;
        }

        self.cache.insert(
            root_id,
            CachedNode {
                child_seed: root_seed,
                existence,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl Core for MockFs {
    async fn list_views(&self) -> Vec<ViewInfo> {
        self.registry.views()
    }

    async fn get_root(&self, view_id: &ViewId) -> Result<Node, FsError> {
        let table = self.resolve_table(view_id)?;
        let sql = format!(
            "SELECT id, parent_id, name, path, type, size, level, checked \
             FROM {} WHERE level = 0 LIMIT 1",
            table
        );
        let node = self
            .db
            .query_row_opt(&table, &sql, Vec::new(), node_from_row)
            .await?;
        node.ok_or_else(|| FsError::NodeNotFound(format!("root of {}", table)))
    }

    async fn list_children(
        &self,
        view_id: &ViewId,
        folder_id: &str,
        folders_only: bool,
    ) -> Result<Vec<Node>, FsError> {
        let table = self.resolve_table(view_id)?;
        let folder = self.generator.folder_info(folder_id, &table).await?;
        let children = self
            .generator
            .generate_children(folder_id, &folder.path, folder.level, folders_only)
            .await?;

        // Fire-and-forget: the response does not wait for the flag to land.
        self.generator.mark_accessed(folder_id, &table);
        Ok(children)
    }

    async fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    async fn clear_cache(&self) {
        self.cache.clear();
    }

    async fn table_stats(&self) -> Result<BTreeMap<String, u64>, FsError> {
        let mut stats = BTreeMap::new();
        for view in self.registry.views() {
            let sql = format!("SELECT COUNT(*) FROM {}", view.table_name);
            let count: Option<i64> = self
                .db
                .query_row_opt(&view.table_name, &sql, Vec::new(), |row| row.get(0))
                .await?;
            stats.insert(view.table_name, count.unwrap_or(0) as u64);
        }
        Ok(stats)
    }
}
