//! Table schemas and the persisted seed record.

use rusqlite::types::Value;

use crate::{Database, StoreError};

/// Lookup table mapping view ids to their tables.
pub const VIEW_LOOKUP_TABLE: &str = "view_lookup";

/// Single-row table recording the master seed and target depth.
pub const SEED_INFO_TABLE: &str = "seed_info";

const VIEW_LOOKUP_SCHEMA: &str = "\
    view_id TEXT NOT NULL PRIMARY KEY,
    table_name TEXT NOT NULL,
    kind TEXT NOT NULL";

const SEED_INFO_SCHEMA: &str = "\
    seed_value INTEGER NOT NULL,
    target_depth INTEGER NOT NULL,
    generation_completed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP";

/// Returns the column list for a nodes table.
///
/// The primary view's table carries the existence map; secondary tables do
/// not. Both persist the child seed.
pub fn nodes_table_schema(with_existence_map: bool) -> String {
    let mut schema = String::from(
        "\
    id TEXT NOT NULL PRIMARY KEY,
    parent_id TEXT NOT NULL,
    name TEXT NOT NULL,
    path TEXT NOT NULL,
    type TEXT NOT NULL CHECK (type IN ('file', 'folder')),
    size INTEGER NOT NULL DEFAULT 0,
    level INTEGER NOT NULL,
    checked INTEGER NOT NULL DEFAULT 0,
",
    );
    if with_existence_map {
        schema.push_str("    existence_map TEXT,\n");
    }
    schema.push_str(
        "\
    child_seed INTEGER,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT DEFAULT CURRENT_TIMESTAMP",
    );
    schema
}

/// Creates the bookkeeping tables.
pub async fn create_registry_tables(db: &Database) -> Result<(), StoreError> {
    db.create_table(VIEW_LOOKUP_TABLE, VIEW_LOOKUP_SCHEMA).await?;
    db.create_table(SEED_INFO_TABLE, SEED_INFO_SCHEMA).await
}

/// The persisted seed record. Written once at init; the target depth is
/// overwritten when the bulk seeder draws its actual depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedInfo {
    /// The master seed all derivations chain from
    pub seed_value: i64,
    /// Depth targeted by the bulk seeder
    pub target_depth: u32,
    /// Set once a bulk generation pass finished
    pub generation_completed: bool,
}

impl SeedInfo {
    /// Writes the record, replacing any previous one.
    pub async fn save(db: &Database, seed_value: i64, target_depth: u32) -> Result<(), StoreError> {
        db.exec("DELETE FROM seed_info", Vec::new()).await?;
        db.exec(
            "INSERT INTO seed_info (seed_value, target_depth, generation_completed) \
             VALUES (?1, ?2, 0)",
            vec![Value::from(seed_value), Value::from(i64::from(target_depth))],
        )
        .await?;
        Ok(())
    }

    /// Loads the record, if one has been written.
    pub async fn load(db: &Database) -> Result<Option<SeedInfo>, StoreError> {
        db.query_row_opt(
            SEED_INFO_TABLE,
            "SELECT seed_value, target_depth, generation_completed FROM seed_info LIMIT 1",
            Vec::new(),
            |row| {
                Ok(SeedInfo {
                    seed_value: row.get(0)?,
                    target_depth: row.get::<_, i64>(1)? as u32,
                    generation_completed: row.get(2)?,
                })
            },
        )
        .await
    }

    /// Marks the bulk generation pass finished.
    pub async fn mark_completed(db: &Database) -> Result<(), StoreError> {
        db.exec("UPDATE seed_info SET generation_completed = 1", Vec::new())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seed_info_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        create_registry_tables(&db).await.unwrap();

        assert_eq!(SeedInfo::load(&db).await.unwrap(), None);

        SeedInfo::save(&db, 4242, 3).await.unwrap();
        let info = SeedInfo::load(&db).await.unwrap().unwrap();
        assert_eq!(info.seed_value, 4242);
        assert_eq!(info.target_depth, 3);
        assert!(!info.generation_completed);

        SeedInfo::mark_completed(&db).await.unwrap();
        let info = SeedInfo::load(&db).await.unwrap().unwrap();
        assert!(info.generation_completed);
    }

    #[tokio::test]
    async fn test_save_replaces_previous_record() {
        let db = Database::open_in_memory().unwrap();
        create_registry_tables(&db).await.unwrap();

        SeedInfo::save(&db, 1, 1).await.unwrap();
        SeedInfo::save(&db, 2, 5).await.unwrap();

        let count: i64 = db
            .query_row_opt(SEED_INFO_TABLE, "SELECT COUNT(*) FROM seed_info", Vec::new(), |r| {
                r.get(0)
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(SeedInfo::load(&db).await.unwrap().unwrap().seed_value, 2);
    }

    #[tokio::test]
    async fn test_nodes_table_schema_variants() {
        let db = Database::open_in_memory().unwrap();
        db.create_table("primary_nodes", &nodes_table_schema(true))
            .await
            .unwrap();
        db.create_table("secondary_nodes", &nodes_table_schema(false))
            .await
            .unwrap();

        // the type CHECK constraint holds
        let err = db
            .exec(
                "INSERT INTO primary_nodes (id, parent_id, name, path, type, level) \
                 VALUES ('x', '', 'x', '/x', 'symlink', 1)",
                Vec::new(),
            )
            .await;
        assert!(err.is_err());
    }
}
