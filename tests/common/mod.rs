//! Shared test fixtures: an in-process cluster with instrumented collaborators

#![allow(dead_code)]

use async_trait::async_trait;
use minidoc::common::{
    CoordinatorConfig, NodeEndpoint, NodeId, NodeState, PartitionId, Result, ShardRequest,
    WriteLocation,
};
use minidoc::coordinator::executor::{CopyExecutor, LocalExecutor};
use minidoc::coordinator::metadata::{
    CollectionMetadata, CollectionSpec, MemoryMetadata, MetadataService,
};
use minidoc::coordinator::resolver;
use minidoc::coordinator::topology::{
    Partition, PlacementTopology, ShardCopy, TopologyService, TopologySnapshot,
};
use minidoc::Coordinator;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;

/// What a copy of a given shard does instead of applying the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardBehavior {
    Fail,
    Hang,
    Gone,
}

/// Executor over local stores that records calls and injects failures
pub struct MockExecutor {
    inner: LocalExecutor,
    failing_nodes: Mutex<HashSet<NodeId>>,
    shards: Mutex<HashMap<u32, ShardBehavior>>,
    calls: Mutex<Vec<(NodeId, PartitionId)>>,
}

impl MockExecutor {
    pub fn new(nodes: &[NodeId]) -> Self {
        Self {
            inner: LocalExecutor::with_nodes(nodes.iter().cloned()),
            failing_nodes: Mutex::new(HashSet::new()),
            shards: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_node(&self, node: &NodeId) {
        self.failing_nodes.lock().unwrap().insert(node.clone());
    }

    pub fn set_shard(&self, shard: u32, behavior: ShardBehavior) {
        self.shards.lock().unwrap().insert(shard, behavior);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<(NodeId, PartitionId)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn local(&self) -> &LocalExecutor {
        &self.inner
    }
}

#[async_trait]
impl CopyExecutor for MockExecutor {
    async fn apply(&self, copy: &ShardCopy, request: &ShardRequest) -> Result<WriteLocation> {
        self.calls
            .lock()
            .unwrap()
            .push((copy.node.clone(), request.partition.clone()));

        if self.failing_nodes.lock().unwrap().contains(&copy.node) {
            return Err(minidoc::Error::CopyUnreachable {
                node: copy.node.to_string(),
                reason: "connection refused".into(),
            });
        }

        let behavior = self
            .shards
            .lock()
            .unwrap()
            .get(&request.partition.shard)
            .copied();
        match behavior {
            Some(ShardBehavior::Fail) => Err(minidoc::Error::Storage("simulated failure".into())),
            Some(ShardBehavior::Gone) => Err(minidoc::Error::ShardNotFound(
                request.partition.to_string(),
            )),
            Some(ShardBehavior::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(minidoc::Error::Internal("woke up".into()))
            }
            None => self.inner.apply(copy, request).await,
        }
    }
}

/// Topology wrapper counting snapshot reads
pub struct CountingTopology {
    inner: PlacementTopology,
    snapshots: AtomicUsize,
}

impl CountingTopology {
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TopologyService for CountingTopology {
    async fn snapshot(&self) -> Result<Arc<TopologySnapshot>> {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        self.inner.snapshot().await
    }

    async fn set_node_state(&self, node: &NodeId, state: NodeState) -> Result<()> {
        self.inner.set_node_state(node, state).await
    }
}

/// Metadata store whose first `parties` lookups wait for each other, so
/// concurrent provisioners all observe a missing collection.
pub struct BarrierMetadata {
    inner: MemoryMetadata,
    barrier: Barrier,
    parties: usize,
    gets: AtomicUsize,
    pub create_attempts: AtomicUsize,
}

impl BarrierMetadata {
    pub fn new(parties: usize) -> Self {
        Self {
            inner: MemoryMetadata::new(),
            barrier: Barrier::new(parties),
            parties,
            gets: AtomicUsize::new(0),
            create_attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MetadataService for BarrierMetadata {
    async fn get(&self, collection: &str) -> Result<Option<CollectionMetadata>> {
        let found = self.inner.get(collection).await?;
        if self.gets.fetch_add(1, Ordering::SeqCst) < self.parties {
            self.barrier.wait().await;
        }
        Ok(found)
    }

    async fn create(&self, spec: CollectionSpec) -> Result<CollectionMetadata> {
        self.create_attempts.fetch_add(1, Ordering::SeqCst);
        self.inner.create(spec).await
    }

    async fn list(&self) -> Result<Vec<CollectionMetadata>> {
        self.inner.list().await
    }
}

pub struct TestCluster {
    pub coordinator: Arc<Coordinator>,
    pub executor: Arc<MockExecutor>,
    pub topology: Arc<CountingTopology>,
    pub metadata: Arc<dyn MetadataService>,
    pub nodes: Vec<NodeId>,
}

pub fn config(partitions: u32, replicas: usize, auto_create: &str) -> CoordinatorConfig {
    CoordinatorConfig {
        default_partitions: partitions,
        replicas,
        auto_create: auto_create.into(),
        default_timeout_ms: 5_000,
        ..CoordinatorConfig::default()
    }
}

pub fn cluster(nodes: usize, config: CoordinatorConfig) -> TestCluster {
    cluster_with_metadata(nodes, config, Arc::new(MemoryMetadata::new()))
}

pub fn cluster_with_metadata(
    nodes: usize,
    config: CoordinatorConfig,
    metadata: Arc<dyn MetadataService>,
) -> TestCluster {
    let ids: Vec<NodeId> = (1..=nodes).map(|i| NodeId::new(format!("n{}", i))).collect();
    let endpoints: Vec<NodeEndpoint> = ids
        .iter()
        .map(|id| NodeEndpoint {
            id: id.clone(),
            address: "embedded".into(),
        })
        .collect();

    let executor = Arc::new(MockExecutor::new(&ids));
    let topology = Arc::new(CountingTopology {
        inner: PlacementTopology::from_endpoints(&endpoints, metadata.clone()),
        snapshots: AtomicUsize::new(0),
    });
    let coordinator = Arc::new(
        Coordinator::new(&config, metadata.clone(), topology.clone(), executor.clone()).unwrap(),
    );

    TestCluster {
        coordinator,
        executor,
        topology,
        metadata,
        nodes: ids,
    }
}

impl TestCluster {
    /// The partition (with its copies) a document id routes to right now
    pub async fn partition_of(&self, collection: &str, id: &str) -> Partition {
        let meta = self.metadata.get(collection).await.unwrap().unwrap();
        let pid = resolver::resolve(&meta, id, None, Default::default()).unwrap();
        let snapshot = self.coordinator.topology().await.unwrap();
        snapshot.partition(&pid).unwrap().clone()
    }

    pub async fn create(&self, spec: CollectionSpec) {
        self.coordinator.create_collection(spec).await.unwrap();
    }
}
