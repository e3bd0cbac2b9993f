//! Single-key mutations through the full coordinator path

mod common;

use common::{cluster, config};
use minidoc::common::{ApplyResult, ConsistencyLevel, FailureKind, VersionType};
use minidoc::coordinator::metadata::CollectionSpec;
use minidoc::coordinator::OperationRequest;
use minidoc::Error;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_missing_routing_is_rejected_before_any_call() {
    let cluster = cluster(3, config(4, 3, "false"));
    cluster
        .create(CollectionSpec::new("orders", 4, 3).with_routing_required(true))
        .await;
    let snapshots_before = cluster.topology.snapshot_count();

    let err = assert_err!(
        cluster
            .coordinator
            .single_key_mutate(OperationRequest::index("orders", "o-1", json!({"total": 3})))
            .await
    );
    assert!(matches!(err, Error::RoutingRequired { .. }));
    assert_eq!(cluster.executor.call_count(), 0);
    assert_eq!(cluster.topology.snapshot_count(), snapshots_before);

    let err = assert_err!(
        cluster
            .coordinator
            .single_key_mutate(
                OperationRequest::index("orders", "o-1", json!({"total": 3}))
                    .with_version(7, VersionType::External)
            )
            .await
    );
    assert!(matches!(err, Error::UnsupportedCombination { .. }));
    assert_eq!(cluster.executor.call_count(), 0);
    assert_eq!(cluster.topology.snapshot_count(), snapshots_before);

    let metrics = cluster.coordinator.metrics();
    assert_eq!(metrics.validation_failures.get(), 2);
}

#[tokio::test]
async fn test_empty_id_is_rejected() {
    let cluster = cluster(3, config(4, 3, "true"));
    let err = assert_err!(
        cluster
            .coordinator
            .single_key_mutate(OperationRequest::delete("orders", ""))
            .await
    );
    assert!(matches!(err, Error::InvalidRequest(_)));
    assert_eq!(cluster.executor.call_count(), 0);
}

#[tokio::test]
async fn test_routing_value_places_document() {
    let cluster = cluster(3, config(8, 2, "false"));
    cluster
        .create(CollectionSpec::new("orders", 8, 2).with_routing_required(true))
        .await;

    let a = assert_ok!(
        cluster
            .coordinator
            .single_key_mutate(
                OperationRequest::index("orders", "o-1", json!({})).with_routing("customer-9")
            )
            .await
    );
    let b = assert_ok!(
        cluster
            .coordinator
            .single_key_mutate(
                OperationRequest::index("orders", "o-2", json!({})).with_routing("customer-9")
            )
            .await
    );
    assert_eq!(a.location.partition, b.location.partition);
}

#[tokio::test]
async fn test_write_reaches_every_copy_with_all() {
    let cluster = cluster(3, config(2, 3, "true"));
    let response = assert_ok!(
        cluster
            .coordinator
            .single_key_mutate(
                OperationRequest::index("articles", "a-1", json!({"title": "hi"}))
                    .with_consistency(ConsistencyLevel::All)
            )
            .await
    );
    assert_eq!(response.location.result, ApplyResult::Created);
    assert_eq!(response.shards.total, 3);
    assert_eq!(response.shards.successful, 3);
    assert_eq!(response.shards.failed, 0);

    for node in &cluster.nodes {
        let store = cluster.executor.local().store(node).unwrap();
        let (version, source) = store.get(&response.location.partition, "a-1").unwrap();
        assert_eq!(version, response.location.version);
        assert_eq!(source, json!({"title": "hi"}));
    }
}

#[tokio::test]
async fn test_quorum_tolerates_one_failed_copy() {
    let cluster = cluster(3, config(1, 3, "true"));
    cluster.create(CollectionSpec::new("articles", 1, 3)).await;
    let partition = cluster.partition_of("articles", "a-1").await;
    let secondary = partition.secondaries().next().unwrap().node.clone();
    cluster.executor.fail_node(&secondary);

    let response = assert_ok!(
        cluster
            .coordinator
            .single_key_mutate(OperationRequest::index("articles", "a-1", json!({})))
            .await
    );
    assert!(response.shards.successful >= 2);
    assert_eq!(response.shards.total, 3);
}

#[tokio::test]
async fn test_quorum_unmet_keeps_primary_write() {
    let cluster = cluster(3, config(1, 3, "true"));
    cluster.create(CollectionSpec::new("articles", 1, 3)).await;
    let partition = cluster.partition_of("articles", "a-1").await;
    for copy in partition.secondaries() {
        cluster.executor.fail_node(&copy.node);
    }

    let err = assert_err!(
        cluster
            .coordinator
            .single_key_mutate(OperationRequest::index("articles", "a-1", json!({"n": 1})))
            .await
    );
    match err {
        Error::QuorumUnmet {
            required,
            acknowledged,
            total,
            ..
        } => {
            assert_eq!(required, 2);
            assert_eq!(acknowledged, 1);
            assert_eq!(total, 3);
        }
        other => panic!("unexpected error: {}", other),
    }

    // Not acknowledged, but durable on the primary
    let primary = partition.primaries().next().unwrap().node.clone();
    let store = cluster.executor.local().store(&primary).unwrap();
    assert!(store.get(&partition.id, "a-1").is_some());
    assert_eq!(cluster.coordinator.metrics().quorum_unmet.get(), 1);
}

#[tokio::test]
async fn test_consistency_one_ignores_failed_copies() {
    let cluster = cluster(3, config(1, 3, "true"));
    cluster.create(CollectionSpec::new("articles", 1, 3)).await;
    let partition = cluster.partition_of("articles", "a-1").await;
    for copy in partition.secondaries() {
        cluster.executor.fail_node(&copy.node);
    }

    let response = assert_ok!(
        cluster
            .coordinator
            .single_key_mutate(
                OperationRequest::index("articles", "a-1", json!({}))
                    .with_consistency(ConsistencyLevel::One)
            )
            .await
    );
    assert!(response.shards.successful >= 1);
}

#[tokio::test]
async fn test_failed_primary_is_not_replicated() {
    let cluster = cluster(3, config(1, 3, "true"));
    cluster.create(CollectionSpec::new("articles", 1, 3)).await;
    let partition = cluster.partition_of("articles", "a-1").await;
    let primary = partition.primaries().next().unwrap().node.clone();
    cluster.executor.fail_node(&primary);

    let err = assert_err!(
        cluster
            .coordinator
            .single_key_mutate(OperationRequest::index("articles", "a-1", json!({})))
            .await
    );
    assert!(matches!(err, Error::PrimaryUnavailable { .. }));
    assert_eq!(err.failure_kind(), FailureKind::PrimaryUnavailable);
    assert_eq!(cluster.executor.call_count(), 1);
}

#[tokio::test]
async fn test_location_token_advances() {
    let cluster = cluster(3, config(1, 2, "true"));
    let first = assert_ok!(
        cluster
            .coordinator
            .single_key_mutate(OperationRequest::index("articles", "a-1", json!({"v": 1})))
            .await
    );
    let second = assert_ok!(
        cluster
            .coordinator
            .single_key_mutate(OperationRequest::index("articles", "a-1", json!({"v": 2})))
            .await
    );
    assert_eq!(second.location.result, ApplyResult::Updated);
    assert!(second.location.seq_no > first.location.seq_no);
    assert!(second.location.version > first.location.version);

    let deleted = assert_ok!(
        cluster
            .coordinator
            .single_key_mutate(OperationRequest::delete("articles", "a-1"))
            .await
    );
    assert_eq!(deleted.location.result, ApplyResult::Deleted);

    let missing = assert_ok!(
        cluster
            .coordinator
            .single_key_mutate(OperationRequest::delete("articles", "a-1"))
            .await
    );
    assert_eq!(missing.location.result, ApplyResult::NotFound);
}

#[tokio::test]
async fn test_external_version_conflict() {
    let cluster = cluster(3, config(1, 1, "true"));
    assert_ok!(
        cluster
            .coordinator
            .single_key_mutate(
                OperationRequest::index("articles", "a-1", json!({}))
                    .with_version(10, VersionType::External)
            )
            .await
    );
    let err = assert_err!(
        cluster
            .coordinator
            .single_key_mutate(
                OperationRequest::index("articles", "a-1", json!({}))
                    .with_version(10, VersionType::External)
            )
            .await
    );
    assert!(matches!(err, Error::VersionConflict { .. }));

    let gte = assert_ok!(
        cluster
            .coordinator
            .single_key_mutate(
                OperationRequest::index("articles", "a-1", json!({}))
                    .with_version(10, VersionType::ExternalGte)
            )
            .await
    );
    assert_eq!(gte.location.version, 10);
}
