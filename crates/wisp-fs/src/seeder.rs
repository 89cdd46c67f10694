//! Eager tree materialization.
//!
//! Walks the tree level by level, scanning the primary table for folders at
//! the previous level in rowid-ordered pages and running the deterministic
//! generator for each. Because every child comes from the same per-folder
//! generation as lazy listing, an eagerly seeded tree is row-for-row
//! identical to one expanded on demand.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::types::Value;
use tracing::{debug, info};

use wisp_core::config::PrimaryTreeConfig;
use wisp_store::{Database, SeedInfo};

use crate::{FsError, Generator};

/// Parents are scanned in rowid-ordered pages of this size.
const SCAN_PAGE_SIZE: i64 = 1000;

/// Summary of a bulk generation pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeedSummary {
    /// Depth targeted by this pass
    pub target_depth: u32,
    /// Nodes generated beneath the root
    pub nodes_generated: u64,
    /// Deepest level that received children
    pub levels_generated: u32,
}

struct LevelStats {
    parents: u64,
    children: u64,
}

/// Materializes the full tree eagerly.
pub struct Seeder<'a> {
    db: &'a Database,
    generator: &'a Generator,
    config: &'a PrimaryTreeConfig,
    primary_table: &'a str,
    master_seed: i64,
}

impl<'a> Seeder<'a> {
    /// Creates a seeder over an initialized database (root row present).
    pub fn new(
        db: &'a Database,
        generator: &'a Generator,
        config: &'a PrimaryTreeConfig,
        primary_table: &'a str,
        master_seed: i64,
    ) -> Self {
        Self {
            db,
            generator,
            config,
            primary_table,
            master_seed,
        }
    }

    /// Runs the full eager pass: draws the target depth, generates level by
    /// level, and marks completion.
    pub async fn run(&self) -> Result<SeedSummary, FsError> {
        let mut rng = StdRng::seed_from_u64(self.master_seed as u64);
        let depth = rng.gen_range(self.config.min_depth..=self.config.max_depth);
        SeedInfo::save(self.db, self.master_seed, depth).await?;
        info!(depth, "starting bulk generation");

        let mut summary = SeedSummary {
            target_depth: depth,
            ..Default::default()
        };
        for level in 1..=depth {
            let stats = self.generate_level(level).await?;
            if stats.parents == 0 {
                debug!(level, "no parents at previous level; stopping early");
                break;
            }
            summary.nodes_generated += stats.children;
            summary.levels_generated = level;
        }

        SeedInfo::mark_completed(self.db).await?;
        info!(
            nodes = summary.nodes_generated,
            levels = summary.levels_generated,
            "bulk generation complete"
        );
        Ok(summary)
    }

    /// Generates all children at `level` from the folders one level up.
    ///
    /// The page query goes through the read path, which drains the primary
    /// queue first, so children inserted for earlier pages are already rows
    /// when the next page is scanned.
    async fn generate_level(&self, level: u32) -> Result<LevelStats, FsError> {
        let parent_level = i64::from(level) - 1;
        let sql = format!(
            "SELECT rowid, id, path, level FROM {} \
             WHERE level = ?1 AND type = 'folder' AND rowid > ?2 \
             ORDER BY rowid LIMIT ?3",
            self.primary_table
        );

        let mut stats = LevelStats {
            parents: 0,
            children: 0,
        };
        let mut last_rowid: i64 = -1;
        loop {
            let page = self
                .db
                .query_rows(
                    self.primary_table,
                    &sql,
                    vec![
                        Value::from(parent_level),
                        Value::from(last_rowid),
                        Value::from(SCAN_PAGE_SIZE),
                    ],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, i64>(3)?,
                        ))
                    },
                )
                .await?;
            if page.is_empty() {
                break;
            }
            let full_page = page.len() as i64 == SCAN_PAGE_SIZE;

            for (rowid, id, path, folder_level) in page {
                last_rowid = last_rowid.max(rowid);
                let children = self
                    .generator
                    .generate_children(&id, &path, folder_level, false)
                    .await?;
                stats.parents += 1;
                stats.children += children.len() as u64;
            }

            if !full_page {
                break;
            }
        }

        debug!(
            level,
            parents = stats.parents,
            children = stats.children,
            "level generated"
        );
        Ok(stats)
    }
}
