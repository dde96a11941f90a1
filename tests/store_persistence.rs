//! Snapshot persistence: save/load round-trips, missing files, stale keys.

use tempfile::TempDir;

use diaflow::diagram::node::StartData;
use diaflow::diagram::{DomainNode, NodeData, Vec2};
use diaflow::store::{DiagramCommand, DiagramStore, PersistError, SnapshotStore};

fn populated_store() -> DiagramStore {
    let mut store = DiagramStore::new();
    store
        .apply(DiagramCommand::AddNode(DomainNode::new(
            "Start",
            Vec2::new(5.0, 5.0),
            NodeData::Start(StartData::default()),
        )))
        .unwrap();
    store
        .apply(DiagramCommand::SetMetadata {
            name: Some("demo".into()),
            description: None,
        })
        .unwrap();
    store
}

#[tokio::test]
async fn save_then_load_round_trips_the_diagram() {
    let dir = TempDir::new().unwrap();
    let snapshots = SnapshotStore::new(dir.path());
    let store = populated_store();

    snapshots.save(store.diagram()).await.unwrap();
    let loaded = snapshots.load().await.unwrap().expect("snapshot present");

    assert_eq!(&loaded, store.diagram());
    assert_eq!(loaded.metadata.name.as_deref(), Some("demo"));

    // A reloaded diagram is valid input for a fresh store.
    let restored = DiagramStore::from_diagram(loaded).unwrap();
    assert_eq!(restored.diagram().nodes.len(), 1);
}

#[tokio::test]
async fn missing_snapshot_is_none_not_an_error() {
    let dir = TempDir::new().unwrap();
    let snapshots = SnapshotStore::new(dir.path());
    assert!(snapshots.load().await.unwrap().is_none());
}

#[tokio::test]
async fn stale_key_is_rejected() {
    let dir = TempDir::new().unwrap();
    let snapshots = SnapshotStore::new(dir.path());

    let body = serde_json::json!({
        "key": "diaflow.diagram.v1",
        "savedAt": "2026-01-01T00:00:00Z",
        "diagram": {}
    });
    tokio::fs::write(snapshots.path(), body.to_string())
        .await
        .unwrap();

    let err = snapshots.load().await.unwrap_err();
    match err {
        PersistError::KeyMismatch { found } => assert_eq!(found, "diaflow.diagram.v1"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn clear_removes_the_snapshot() {
    let dir = TempDir::new().unwrap();
    let snapshots = SnapshotStore::new(dir.path());
    let store = populated_store();

    snapshots.save(store.diagram()).await.unwrap();
    snapshots.clear().await.unwrap();
    assert!(snapshots.load().await.unwrap().is_none());

    // Clearing twice is fine.
    snapshots.clear().await.unwrap();
}
