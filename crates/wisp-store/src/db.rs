//! Shared database handle and the per-table write pipeline.
//!
//! Reads drain the target table's queue before touching the database, so a
//! caller always observes its own queued writes. Batch execution happens in
//! one transaction per batch; a failed transaction rolls back, is logged,
//! and its operations are dropped.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::queue::{Batch, OpKind, QueueKind, WriteOp, WriteQueue};
use crate::StoreError;

/// Shared SQLite handle plus the write pipeline for every registered table.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    queues: RwLock<HashMap<String, Arc<WriteQueue>>>,
    shutdown: watch::Sender<bool>,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl Database {
    /// Opens (or creates) the database file and enables WAL journaling.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self::from_connection(conn))
    }

    /// Opens an in-memory database. Used by unit tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            conn: Arc::new(Mutex::new(conn)),
            queues: RwLock::new(HashMap::new()),
            shutdown,
            tasks: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Registers a write queue for a table and starts its timed flusher.
    ///
    /// Must be called from within a tokio runtime.
    pub fn register_queue(
        &self,
        table: &str,
        kind: QueueKind,
        batch_size: usize,
        flush_interval: Duration,
    ) {
        let queue = Arc::new(WriteQueue::new(
            table.to_string(),
            kind,
            batch_size,
            flush_interval,
        ));
        self.queues
            .write()
            .insert(table.to_string(), Arc::clone(&queue));
        self.spawn_flusher(queue);
    }

    fn spawn_flusher(&self, queue: Arc<WriteQueue>) {
        let conn = Arc::clone(&self.conn);
        let mut shutdown = self.shutdown.subscribe();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(queue.flush_interval());
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        Self::run_flush(&conn, &queue, true).await;
                    }
                    _ = shutdown.changed() => break,
                }
            }
            debug!(table = queue.table(), "timed flusher stopped");
        });
        self.tasks.lock().push(handle);
    }

    /// Queues an insert-style operation on a table's pipeline.
    pub fn queue_write(&self, table: &str, sql: &str, params: Vec<Value>) {
        self.enqueue(
            table,
            WriteOp {
                path: String::new(),
                sql: sql.to_string(),
                params,
                kind: OpKind::Insert,
            },
        );
    }

    /// Queues an update-style operation grouped under a path.
    pub fn queue_update(&self, table: &str, path: &str, sql: &str, params: Vec<Value>) {
        self.enqueue(
            table,
            WriteOp {
                path: path.to_string(),
                sql: sql.to_string(),
                params,
                kind: OpKind::Update,
            },
        );
    }

    fn enqueue(&self, table: &str, op: WriteOp) {
        match self.queues.read().get(table) {
            Some(queue) => queue.add(op),
            None => warn!(table, "write for unregistered table dropped"),
        }
    }

    /// Runs one flush attempt for a table's queue.
    pub async fn flush_queue(&self, table: &str, force: bool) {
        let queue = self.queues.read().get(table).cloned();
        if let Some(queue) = queue {
            Self::run_flush(&self.conn, &queue, force).await;
        }
    }

    /// Drains a table's queue completely, repeating while operations arrive
    /// between snapshot and commit or while a concurrent flush holds the
    /// gate.
    pub async fn force_flush(&self, table: &str) {
        let queue = match self.queues.read().get(table).cloned() {
            Some(queue) => queue,
            None => return,
        };
        loop {
            Self::run_flush(&self.conn, &queue, true).await;
            if queue.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
    }

    async fn run_flush(conn: &Mutex<Connection>, queue: &WriteQueue, force: bool) {
        let batches = queue.begin_flush(force);
        if batches.is_empty() {
            return;
        }

        let mut conn = conn.lock().await;
        for batch in &batches {
            match Self::execute_batch(&mut conn, batch) {
                Ok(()) => queue.record_commit(),
                Err(err) => {
                    error!(
                        table = queue.table(),
                        kind = batch.kind.as_str(),
                        ops = batch.ops.len(),
                        %err,
                        "batch transaction failed; operations dropped"
                    );
                }
            }
        }
        drop(conn);
        queue.finish_flush();
    }

    fn execute_batch(conn: &mut Connection, batch: &Batch) -> Result<(), StoreError> {
        let tx = conn.transaction()?;
        for op in &batch.ops {
            let affected = tx.execute(&op.sql, params_from_iter(op.params.iter()))?;
            if affected == 0 && matches!(op.kind, OpKind::Update | OpKind::Delete) {
                warn!(
                    table = %batch.table,
                    sql = %op.sql,
                    "{} affected no rows",
                    op.kind.as_str()
                );
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Executes a statement directly, outside any queue.
    pub async fn exec(&self, sql: &str, params: Vec<Value>) -> Result<usize, StoreError> {
        let conn = self.conn.lock().await;
        Ok(conn.execute(sql, params_from_iter(params.iter()))?)
    }

    /// Creates a table if it does not exist.
    pub async fn create_table(&self, table: &str, schema: &str) -> Result<(), StoreError> {
        let sql = format!("CREATE TABLE IF NOT EXISTS {} ({})", table, schema);
        self.exec(&sql, Vec::new()).await.map(|_| ())
    }

    /// Runs a read against a table, draining that table's queue first so
    /// writes queued by this process are visible.
    pub async fn query_rows<T, F>(
        &self,
        table: &str,
        sql: &str,
        params: Vec<Value>,
        map: F,
    ) -> Result<Vec<T>, StoreError>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.force_flush(table).await;
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), map)?;
        Ok(rows.collect::<rusqlite::Result<Vec<T>>>()?)
    }

    /// Runs a single-row read with the same drain-first rule. Returns `None`
    /// when the query matches no row.
    pub async fn query_row_opt<T, F>(
        &self,
        table: &str,
        sql: &str,
        params: Vec<Value>,
        map: F,
    ) -> Result<Option<T>, StoreError>
    where
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.force_flush(table).await;
        let conn = self.conn.lock().await;
        Ok(conn
            .query_row(sql, params_from_iter(params.iter()), map)
            .optional()?)
    }

    /// Pending operations on a table's queue.
    pub fn pending_ops(&self, table: &str) -> usize {
        self.queues.read().get(table).map_or(0, |q| q.len())
    }

    /// Batch transactions committed for a table's queue.
    pub fn commit_count(&self, table: &str) -> u64 {
        self.queues.read().get(table).map_or(0, |q| q.commit_count())
    }

    /// Force-flushes every queue, stops the timed flushers, and waits for
    /// them to finish. Call before dropping the handle.
    pub async fn close(&self) {
        let tables: Vec<String> = self.queues.read().keys().cloned().collect();
        for table in &tables {
            self.force_flush(table).await;
        }

        let _ = self.shutdown.send(true);
        let handles: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
        debug!("database closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_table("items", "id TEXT PRIMARY KEY, n INTEGER NOT NULL")
            .await
            .unwrap();
        db.register_queue("items", QueueKind::Node, 1000, Duration::from_secs(60));
        db
    }

    fn insert_op(id: &str, n: i64) -> (String, Vec<Value>) {
        (
            "INSERT OR IGNORE INTO items (id, n) VALUES (?1, ?2)".to_string(),
            vec![Value::from(id.to_string()), Value::from(n)],
        )
    }

    async fn count(db: &Database) -> i64 {
        db.query_row_opt("items", "SELECT COUNT(*) FROM items", Vec::new(), |row| {
            row.get(0)
        })
        .await
        .unwrap()
        .unwrap()
    }

    #[tokio::test]
    async fn test_read_drains_queue() {
        let db = test_db().await;
        for i in 0..5 {
            let (sql, params) = insert_op(&format!("id-{}", i), i);
            db.queue_write("items", &sql, params);
        }
        // no explicit flush; the read must drain first
        assert_eq!(count(&db).await, 5);
        assert_eq!(db.pending_ops("items"), 0);
        db.close().await;
    }

    #[tokio::test]
    async fn test_failed_batch_is_dropped() {
        let db = test_db().await;
        db.queue_write("items", "INSERT INTO missing_table (x) VALUES (1)", Vec::new());
        db.force_flush("items").await;

        // the pipeline keeps working after a failed transaction
        let (sql, params) = insert_op("survivor", 1);
        db.queue_write("items", &sql, params);
        assert_eq!(count(&db).await, 1);
        db.close().await;
    }

    #[tokio::test]
    async fn test_zero_row_update_is_not_fatal() {
        let db = test_db().await;
        db.queue_update(
            "items",
            "",
            "UPDATE items SET n = 9 WHERE id = 'absent'",
            Vec::new(),
        );
        let (sql, params) = insert_op("present", 2);
        db.queue_write("items", &sql, params);
        assert_eq!(count(&db).await, 1);
        db.close().await;
    }

    #[tokio::test]
    async fn test_commit_counter_tracks_batches() {
        let db = test_db().await;
        for i in 0..3 {
            let (sql, params) = insert_op(&format!("a-{}", i), i);
            db.queue_write("items", &sql, params);
        }
        db.force_flush("items").await;
        assert_eq!(db.commit_count("items"), 1);

        let (sql, params) = insert_op("b", 0);
        db.queue_write("items", &sql, params);
        db.force_flush("items").await;
        assert_eq!(db.commit_count("items"), 2);
        db.close().await;
    }

    #[tokio::test]
    async fn test_timed_flusher_drains_in_background() {
        let db = Database::open_in_memory().unwrap();
        db.create_table("items", "id TEXT PRIMARY KEY, n INTEGER NOT NULL")
            .await
            .unwrap();
        db.register_queue("items", QueueKind::Node, 1000, Duration::from_millis(10));

        let (sql, params) = insert_op("bg", 1);
        db.queue_write("items", &sql, params);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(db.pending_ops("items"), 0);
        assert!(db.commit_count("items") >= 1);
        db.close().await;
    }

    #[tokio::test]
    async fn test_close_flushes_everything() {
        let db = test_db().await;
        let (sql, params) = insert_op("last", 7);
        db.queue_write("items", &sql, params);
        db.close().await;

        // queue is drained even though nothing read the table
        assert_eq!(db.pending_ops("items"), 0);
    }
}
