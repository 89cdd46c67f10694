//! Bulk seeder: eager/lazy equivalence, depth handling, completion flag.

use wisp_store::SeedInfo;
use wisp_tests::{TestFs, TreeSpec};

fn key(node: &wisp_core::Node) -> (String, String, String, String, String, i64, i64) {
    (
        node.id.clone(),
        node.parent_id.clone(),
        node.name.clone(),
        node.path.clone(),
        node.kind.as_str().to_string(),
        node.size,
        node.level,
    )
}

#[tokio::test]
async fn eager_and_lazy_trees_are_identical() {
    let spec = TreeSpec {
        seed: 99,
        folders: (2, 2),
        files: (1, 1),
        depth: (3, 3),
        ..Default::default()
    };

    let eager = TestFs::open(&spec).await;
    eager.fs.bulk_seed().await.unwrap();
    let mut r_eager: Vec<_> = eager.rows("nodes").await.iter().map(key).collect();
    r_eager.sort();
    eager.fs.close().await;

    let lazy = TestFs::open(&spec).await;
    lazy.expand_to_depth(3).await;
    let mut r_lazy: Vec<_> = lazy.rows("nodes").await.iter().map(key).collect();
    r_lazy.sort();
    lazy.fs.close().await;

    assert_eq!(r_eager, r_lazy);
}

#[tokio::test]
async fn seeder_respects_target_depth() {
    let spec = TreeSpec {
        seed: 3,
        folders: (1, 2),
        files: (0, 1),
        depth: (1, 3),
        ..Default::default()
    };
    let t = TestFs::open(&spec).await;
    let summary = t.fs.bulk_seed().await.unwrap();

    assert!((1..=3).contains(&summary.target_depth));
    let max_level = t
        .rows("nodes")
        .await
        .iter()
        .map(|n| n.level)
        .max()
        .unwrap();
    assert!(max_level <= i64::from(summary.target_depth));
    t.fs.close().await;
}

#[tokio::test]
async fn seeder_marks_completion() {
    let t = TestFs::open(&TreeSpec::default()).await;

    let before = SeedInfo::load(t.fs.database()).await.unwrap().unwrap();
    assert!(!before.generation_completed);

    let summary = t.fs.bulk_seed().await.unwrap();
    let after = SeedInfo::load(t.fs.database()).await.unwrap().unwrap();
    assert!(after.generation_completed);
    assert_eq!(after.seed_value, t.fs.master_seed());
    assert_eq!(after.target_depth, summary.target_depth);
    t.fs.close().await;
}

#[tokio::test]
async fn summary_counts_match_rows() {
    let spec = TreeSpec {
        seed: 21,
        folders: (2, 3),
        files: (1, 2),
        depth: (2, 2),
        ..Default::default()
    };
    let t = TestFs::open(&spec).await;
    let summary = t.fs.bulk_seed().await.unwrap();

    // everything but the root was generated by this pass
    assert_eq!(summary.nodes_generated, t.row_count("nodes").await - 1);
    assert_eq!(summary.levels_generated, 2);
    t.fs.close().await;
}

#[tokio::test]
async fn childless_config_stops_early() {
    let spec = TreeSpec {
        seed: 8,
        folders: (0, 0),
        files: (0, 0),
        depth: (2, 2),
        ..Default::default()
    };
    let t = TestFs::open(&spec).await;
    let summary = t.fs.bulk_seed().await.unwrap();

    assert_eq!(summary.nodes_generated, 0);
    assert_eq!(t.row_count("nodes").await, 1);
    t.fs.close().await;
}

#[tokio::test]
async fn seeder_populates_secondaries() {
    let spec = TreeSpec {
        seed: 13,
        folders: (2, 2),
        files: (1, 1),
        depth: (2, 2),
        secondaries: vec![("nodes_all", 1.0)],
        ..Default::default()
    };
    let t = TestFs::open(&spec).await;
    t.fs.bulk_seed().await.unwrap();

    assert_eq!(
        t.row_count("nodes").await,
        t.row_count("nodes_all").await
    );
    t.fs.close().await;
}
