//! Persisted view registry: `view_id ↔ table_name ↔ kind`.
//!
//! View ids are minted on first configuration and persisted in
//! `view_lookup`; reopening an existing database reloads the same ids, so
//! they are stable across process restarts. Views are never renamed.

use std::collections::HashMap;

use rusqlite::types::Value;
use wisp_core::config::TablesConfig;
use wisp_core::{ViewId, ViewInfo, ViewKind};

use crate::schema::VIEW_LOOKUP_TABLE;
use crate::{Database, StoreError};

/// A secondary view descriptor paired with its inclusion probability.
#[derive(Debug, Clone)]
pub struct SecondaryView {
    /// The view descriptor
    pub info: ViewInfo,
    /// Probability a node lands in this view
    pub inclusion_prob: f64,
}

/// Registry of configured views with their persisted stable ids.
///
/// Immutable after open; lookups are plain map reads.
pub struct ViewRegistry {
    primary: ViewInfo,
    secondaries: Vec<SecondaryView>,
    table_by_id: HashMap<ViewId, String>,
    id_by_table: HashMap<String, ViewId>,
}

impl ViewRegistry {
    /// Loads persisted view ids for the configured tables, minting and
    /// persisting fresh ids for tables seen for the first time.
    pub async fn open(db: &Database, tables: &TablesConfig) -> Result<Self, StoreError> {
        let rows = db
            .query_rows(
                VIEW_LOOKUP_TABLE,
                "SELECT view_id, table_name FROM view_lookup",
                Vec::new(),
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .await?;
        let mut persisted: HashMap<String, ViewId> = rows
            .into_iter()
            .map(|(id, table)| (table, ViewId::from(id)))
            .collect();

        let primary =
            Self::resolve(db, &mut persisted, &tables.primary.table_name, ViewKind::Primary)
                .await?;

        let mut secondaries = Vec::with_capacity(tables.secondary.len());
        for config in tables.secondary.values() {
            let info =
                Self::resolve(db, &mut persisted, &config.table_name, ViewKind::Secondary).await?;
            secondaries.push(SecondaryView {
                info,
                inclusion_prob: config.dst_prob,
            });
        }

        let mut table_by_id = HashMap::new();
        let mut id_by_table = HashMap::new();
        for info in std::iter::once(&primary).chain(secondaries.iter().map(|s| &s.info)) {
            table_by_id.insert(info.view_id.clone(), info.table_name.clone());
            id_by_table.insert(info.table_name.clone(), info.view_id.clone());
        }

        Ok(Self {
            primary,
            secondaries,
            table_by_id,
            id_by_table,
        })
    }

    async fn resolve(
        db: &Database,
        persisted: &mut HashMap<String, ViewId>,
        table: &str,
        kind: ViewKind,
    ) -> Result<ViewInfo, StoreError> {
        if let Some(view_id) = persisted.remove(table) {
            return Ok(ViewInfo {
                view_id,
                table_name: table.to_string(),
                kind,
            });
        }

        let view_id = ViewId::random();
        db.exec(
            "INSERT OR REPLACE INTO view_lookup (view_id, table_name, kind) VALUES (?1, ?2, ?3)",
            vec![
                Value::from(view_id.as_str().to_string()),
                Value::from(table.to_string()),
                Value::from(kind.as_str().to_string()),
            ],
        )
        .await?;
        Ok(ViewInfo {
            view_id,
            table_name: table.to_string(),
            kind,
        })
    }

    /// The primary view.
    pub fn primary(&self) -> &ViewInfo {
        &self.primary
    }

    /// The primary view's table name.
    pub fn primary_table(&self) -> &str {
        &self.primary.table_name
    }

    /// The secondary views, in configuration order.
    pub fn secondaries(&self) -> &[SecondaryView] {
        &self.secondaries
    }

    /// Secondary table names, in configuration order.
    pub fn secondary_table_names(&self) -> Vec<String> {
        self.secondaries
            .iter()
            .map(|s| s.info.table_name.clone())
            .collect()
    }

    /// Every table name, primary first.
    pub fn table_names(&self) -> Vec<String> {
        let mut names = vec![self.primary.table_name.clone()];
        names.extend(self.secondaries.iter().map(|s| s.info.table_name.clone()));
        names
    }

    /// Every view, primary first.
    pub fn views(&self) -> Vec<ViewInfo> {
        let mut views = vec![self.primary.clone()];
        views.extend(self.secondaries.iter().map(|s| s.info.clone()));
        views
    }

    /// Resolves a view id to its table name.
    pub fn table_for(&self, view_id: &ViewId) -> Option<&str> {
        self.table_by_id.get(view_id).map(String::as_str)
    }

    /// Resolves a table name back to its view id.
    pub fn view_for_table(&self, table: &str) -> Option<&ViewId> {
        self.id_by_table.get(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;
    use std::collections::BTreeMap;
    use wisp_core::config::{PrimaryTreeConfig, SecondaryViewConfig};

    fn tables_config() -> TablesConfig {
        let mut secondary = BTreeMap::new();
        secondary.insert(
            "a".to_string(),
            SecondaryViewConfig {
                table_name: "nodes_a".to_string(),
                dst_prob: 0.5,
            },
        );
        secondary.insert(
            "b".to_string(),
            SecondaryViewConfig {
                table_name: "nodes_b".to_string(),
                dst_prob: 1.0,
            },
        );
        TablesConfig {
            primary: PrimaryTreeConfig {
                table_name: "nodes".to_string(),
                seed: 1,
                min_child_folders: 0,
                max_child_folders: 1,
                min_child_files: 0,
                max_child_files: 1,
                min_depth: 1,
                max_depth: 1,
            },
            secondary,
        }
    }

    #[tokio::test]
    async fn test_registry_persists_and_reloads_ids() {
        let db = Database::open_in_memory().unwrap();
        schema::create_registry_tables(&db).await.unwrap();
        let config = tables_config();

        let first = ViewRegistry::open(&db, &config).await.unwrap();
        let second = ViewRegistry::open(&db, &config).await.unwrap();

        assert_eq!(first.primary().view_id, second.primary().view_id);
        let first_ids: Vec<_> = first.secondaries().iter().map(|s| &s.info.view_id).collect();
        let second_ids: Vec<_> = second.secondaries().iter().map(|s| &s.info.view_id).collect();
        assert_eq!(first_ids, second_ids);
    }

    #[tokio::test]
    async fn test_registry_lookups() {
        let db = Database::open_in_memory().unwrap();
        schema::create_registry_tables(&db).await.unwrap();
        let registry = ViewRegistry::open(&db, &tables_config()).await.unwrap();

        let primary_id = registry.primary().view_id.clone();
        assert_eq!(registry.table_for(&primary_id), Some("nodes"));
        assert_eq!(registry.view_for_table("nodes"), Some(&primary_id));
        assert_eq!(registry.table_for(&ViewId::from("unknown")), None);

        // configuration order, primary first
        assert_eq!(registry.table_names(), vec!["nodes", "nodes_a", "nodes_b"]);
        let kinds: Vec<ViewKind> = registry.views().iter().map(|v| v.kind).collect();
        assert_eq!(
            kinds,
            vec![ViewKind::Primary, ViewKind::Secondary, ViewKind::Secondary]
        );
    }
}
