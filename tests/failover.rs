//! Writes while nodes leave and rejoin the cluster

mod common;

use common::{cluster, config};
use minidoc::common::{FailureKind, NodeId, NodeState};
use minidoc::coordinator::metadata::CollectionSpec;
use minidoc::coordinator::OperationRequest;
use minidoc::Error;
use serde_json::json;

#[tokio::test]
async fn test_dead_primary_is_replaced() {
    let cluster = cluster(3, config(1, 3, "false"));
    cluster.create(CollectionSpec::new("users", 1, 3)).await;

    let before = cluster.partition_of("users", "u-1").await;
    let old_primary = before.primaries().next().unwrap().node.clone();
    cluster
        .coordinator
        .set_node_state(&old_primary, NodeState::Dead)
        .await
        .unwrap();

    let response = cluster
        .coordinator
        .single_key_mutate(OperationRequest::index("users", "u-1", json!({"name": "sam"})))
        .await
        .unwrap();
    assert_ne!(response.location.node, old_primary);

    // The dead copy counts toward the total without being called
    assert_eq!(response.shards.total, 3);
    assert!(response
        .shards
        .failures
        .iter()
        .any(|f| f.node.as_ref() == Some(&old_primary) && f.kind == FailureKind::Unreachable));
    assert!(cluster
        .executor
        .calls()
        .iter()
        .all(|(node, _)| node != &old_primary));
}

#[tokio::test]
async fn test_two_dead_copies_break_quorum_but_not_one() {
    let cluster = cluster(3, config(1, 3, "false"));
    cluster.create(CollectionSpec::new("users", 1, 3)).await;
    let partition = cluster.partition_of("users", "u-1").await;
    let secondaries: Vec<NodeId> = partition.secondaries().map(|c| c.node.clone()).collect();

    cluster
        .coordinator
        .set_node_state(&secondaries[0], NodeState::Suspect)
        .await
        .unwrap();
    cluster
        .coordinator
        .single_key_mutate(OperationRequest::index("users", "u-1", json!({})))
        .await
        .unwrap();

    cluster
        .coordinator
        .set_node_state(&secondaries[1], NodeState::Draining)
        .await
        .unwrap();
    let err = cluster
        .coordinator
        .single_key_mutate(OperationRequest::index("users", "u-1", json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::QuorumUnmet { acknowledged: 1, .. }));
}

#[tokio::test]
async fn test_no_live_copy_means_no_primary() {
    let cluster = cluster(2, config(1, 2, "false"));
    cluster.create(CollectionSpec::new("users", 1, 2)).await;
    for node in &cluster.nodes {
        cluster
            .coordinator
            .set_node_state(node, NodeState::Dead)
            .await
            .unwrap();
    }

    let err = cluster
        .coordinator
        .single_key_mutate(OperationRequest::index("users", "u-1", json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PrimaryUnavailable { .. }));
    assert_eq!(cluster.executor.call_count(), 0);
    assert_eq!(cluster.coordinator.metrics().primary_failures.get(), 1);
}

#[tokio::test]
async fn test_rejoined_node_takes_writes_again() {
    let cluster = cluster(3, config(1, 3, "false"));
    cluster.create(CollectionSpec::new("users", 1, 3)).await;
    let partition = cluster.partition_of("users", "u-1").await;
    let primary = partition.primaries().next().unwrap().node.clone();

    let version_before = cluster.coordinator.topology().await.unwrap().version;
    cluster
        .coordinator
        .set_node_state(&primary, NodeState::Dead)
        .await
        .unwrap();
    cluster
        .coordinator
        .set_node_state(&primary, NodeState::Alive)
        .await
        .unwrap();
    let version_after = cluster.coordinator.topology().await.unwrap().version;
    assert_eq!(version_after, version_before + 2);

    let response = cluster
        .coordinator
        .single_key_mutate(OperationRequest::index("users", "u-1", json!({})))
        .await
        .unwrap();
    assert_eq!(response.location.node, primary);
}

#[tokio::test]
async fn test_unknown_node_state_change_is_rejected() {
    let cluster = cluster(3, config(1, 3, "false"));
    let err = cluster
        .coordinator
        .set_node_state(&NodeId::new("n42"), NodeState::Dead)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
}
