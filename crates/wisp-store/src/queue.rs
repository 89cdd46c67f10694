//! Per-table write queue with batch- and time-triggered flushing.
//!
//! A queue only collects and snapshots operations; executing the returned
//! batches against the database is the caller's job. A single-flight gate
//! keeps overlapping flush attempts from racing: the decision to flush and
//! the marking of the gate happen under one lock, and the gate stays set
//! until the caller reports the batches committed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rusqlite::types::Value;

/// How a queue groups its pending operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    /// Node tables: operations carry an explicit kind and a grouping path;
    /// a flush emits one batch per operation kind.
    Node,
    /// Log tables: every operation is an insert and a flush emits a single
    /// batch.
    Log,
}

/// The SQL verb a queued operation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Row insert
    Insert,
    /// Row update
    Update,
    /// Row delete
    Delete,
}

impl OpKind {
    /// Returns a short label for logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OpKind::Insert => "insert",
            OpKind::Update => "update",
            OpKind::Delete => "delete",
        }
    }
}

/// A queued SQL operation with owned parameters.
#[derive(Debug, Clone)]
pub struct WriteOp {
    /// Grouping path. Unused for coalescing today; every hot-path enqueue
    /// passes an empty path.
    pub path: String,
    /// The SQL statement
    pub sql: String,
    /// Positional parameters
    pub params: Vec<Value>,
    /// Operation kind
    pub kind: OpKind,
}

/// A group of operations executed in one transaction.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Table the operations target
    pub table: String,
    /// Kind shared by every operation in the batch
    pub kind: OpKind,
    /// The operations, in enqueue order
    pub ops: Vec<WriteOp>,
}

struct QueueState {
    pending: Vec<WriteOp>,
    last_flushed: Instant,
    ready_to_write: bool,
    is_writing: bool,
}

/// FIFO of pending row operations for a single table.
pub struct WriteQueue {
    table: String,
    kind: QueueKind,
    batch_size: usize,
    flush_interval: Duration,
    state: Mutex<QueueState>,
    commits: AtomicU64,
}

impl WriteQueue {
    /// Creates a queue for a table.
    pub fn new(table: String, kind: QueueKind, batch_size: usize, flush_interval: Duration) -> Self {
        Self {
            table,
            kind,
            batch_size,
            flush_interval,
            state: Mutex::new(QueueState {
                pending: Vec::new(),
                last_flushed: Instant::now(),
                ready_to_write: false,
                is_writing: false,
            }),
            commits: AtomicU64::new(0),
        }
    }

    /// Returns the table this queue serves.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the configured flush interval.
    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Appends an operation. Never blocks on the database; reaching
    /// `batch_size` pending operations only marks the queue ready.
    pub fn add(&self, op: WriteOp) {
        let mut state = self.state.lock();
        state.pending.push(op);
        if state.pending.len() >= self.batch_size {
            state.ready_to_write = true;
        }
    }

    /// Number of pending operations.
    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Returns true if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.state.lock().pending.is_empty()
    }

    /// Decides whether a flush should run and, if so, snapshots and clears
    /// the queue, returning the batches to execute.
    ///
    /// An empty result means either nothing to flush or another flush in
    /// flight; both are fine to ignore. After executing the batches the
    /// caller must invoke [`WriteQueue::finish_flush`].
    pub fn begin_flush(&self, force: bool) -> Vec<Batch> {
        let mut state = self.state.lock();
        if state.is_writing || state.pending.is_empty() {
            return Vec::new();
        }

        let timed = state.last_flushed.elapsed() >= self.flush_interval;
        if !(force || state.ready_to_write || timed) {
            return Vec::new();
        }

        state.is_writing = true;
        state.ready_to_write = false;
        state.last_flushed = Instant::now();
        let snapshot = std::mem::take(&mut state.pending);
        drop(state);

        self.group(snapshot)
    }

    /// Clears the single-flight gate once the batches from the matching
    /// [`WriteQueue::begin_flush`] have been executed.
    pub fn finish_flush(&self) {
        self.state.lock().is_writing = false;
    }

    /// Records one committed batch transaction.
    pub fn record_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of batch transactions committed so far.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    fn group(&self, ops: Vec<WriteOp>) -> Vec<Batch> {
        match self.kind {
            QueueKind::Log => vec![Batch {
                table: self.table.clone(),
                kind: OpKind::Insert,
                ops,
            }],
            QueueKind::Node => {
                let mut inserts = Vec::new();
                let mut updates = Vec::new();
                let mut deletes = Vec::new();
                for op in ops {
                    match op.kind {
                        OpKind::Insert => inserts.push(op),
                        OpKind::Update => updates.push(op),
                        OpKind::Delete => deletes.push(op),
                    }
                }

                [
                    (OpKind::Insert, inserts),
                    (OpKind::Update, updates),
                    (OpKind::Delete, deletes),
                ]
                .into_iter()
                .filter(|(_, ops)| !ops.is_empty())
                .map(|(kind, ops)| Batch {
                    table: self.table.clone(),
                    kind,
                    ops,
                })
                .collect()
            }
        }
    }
}
