//! Write pipeline ordering: batching, read-before-flush, the checked flag.

use rusqlite::types::Value;
use wisp_fs::Core;
use wisp_tests::{TestFs, TreeSpec};

/// A long flush interval keeps the timed flusher out of these tests.
fn slow_flush_spec() -> TreeSpec {
    TreeSpec {
        flush_interval_ms: 10_000,
        ..Default::default()
    }
}

#[tokio::test]
async fn batched_inserts_become_visible_on_read() {
    // 1500 queued inserts with batch_size 1000: the first read drains them
    // all, and the whole backlog lands in a single snapshot
    let t = TestFs::open(&slow_flush_spec()).await;
    let db = t.fs.database();
    let commits_before = db.commit_count("nodes");

    let sql = "INSERT OR IGNORE INTO nodes \
               (id, parent_id, name, path, type, size, level, checked) \
               VALUES (?1, ?2, ?3, ?4, 'file', 100, 1, 0)";
    for i in 0..1500 {
        db.queue_write(
            "nodes",
            sql,
            vec![
                Value::from(format!("bulk-{}", i)),
                Value::from("parent".to_string()),
                Value::from(format!("bulk_{}.txt", i)),
                Value::from(format!("/bulk_{}.txt", i)),
            ],
        );
    }

    // root + 1500 synthetic rows, no explicit flush
    assert_eq!(t.row_count("nodes").await, 1501);
    assert!(
        db.commit_count("nodes") - commits_before <= 2,
        "expected at most two transactions"
    );
    t.fs.close().await;
}

#[tokio::test]
async fn reader_sees_writes_queued_by_another_caller() {
    // caller A materializes children through the queue; caller B reads the
    // table before the (10s) timed flusher can possibly fire
    let t = TestFs::open(&slow_flush_spec()).await;
    let view = t.primary_view();
    let root = t.fs.get_root(&view).await.unwrap();

    let children = t.fs.list_children(&view, &root.id, false).await.unwrap();
    assert_eq!(children.len(), 3);

    let rows = t.rows("nodes").await;
    assert_eq!(rows.len(), 4);
    for child in &children {
        assert!(rows.iter().any(|r| r.id == child.id));
    }
    t.fs.close().await;
}

#[tokio::test]
async fn listing_marks_folder_checked() {
    let t = TestFs::open(&slow_flush_spec()).await;
    let view = t.primary_view();

    let root = t.fs.get_root(&view).await.unwrap();
    assert!(!root.checked);

    t.fs.list_children(&view, &root.id, false).await.unwrap();

    // the queued update lands once the read drains the queue
    let root = t.fs.get_root(&view).await.unwrap();
    assert!(root.checked);

    // freshly generated children start unchecked
    let child = t
        .rows("nodes")
        .await
        .into_iter()
        .find(|n| n.level == 1 && n.is_folder())
        .unwrap();
    assert!(!child.checked);
    t.fs.close().await;
}

#[tokio::test]
async fn checked_propagates_to_listed_subfolders() {
    let t = TestFs::open(&slow_flush_spec()).await;
    let view = t.primary_view();
    let root = t.fs.get_root(&view).await.unwrap();
    let children = t.fs.list_children(&view, &root.id, false).await.unwrap();
    let folder = children.iter().find(|c| c.is_folder()).unwrap();

    t.fs.list_children(&view, &folder.id, false).await.unwrap();

    let listed = t
        .rows("nodes")
        .await
        .into_iter()
        .find(|n| n.id == folder.id)
        .unwrap();
    assert!(listed.checked);
    t.fs.close().await;
}

#[tokio::test]
async fn timed_flusher_drains_without_reads() {
    let spec = TreeSpec {
        flush_interval_ms: 20,
        ..Default::default()
    };
    let t = TestFs::open(&spec).await;
    let view = t.primary_view();
    let root = t.fs.get_root(&view).await.unwrap();
    t.fs.list_children(&view, &root.id, false).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(t.fs.database().pending_ops("nodes"), 0);
    t.fs.close().await;
}

#[tokio::test]
async fn close_drains_all_queues() {
    let spec = TreeSpec {
        flush_interval_ms: 10_000,
        secondaries: vec![("nodes_all", 1.0)],
        ..Default::default()
    };
    let t = TestFs::open(&spec).await;
    let view = t.primary_view();
    let root = t.fs.get_root(&view).await.unwrap();
    t.fs.list_children(&view, &root.id, false).await.unwrap();
    t.fs.close().await;

    // reopen and observe everything the queues held
    let t = t.reopen().await;
    assert_eq!(t.row_count("nodes").await, 4);
    assert_eq!(t.row_count("nodes_all").await, 4);
    t.fs.close().await;
}
