//! The coordinator's operation surface
//!
//! `Coordinator` wires the collaborators (metadata, topology, copy executor)
//! to the provision guard, the resolver and the two coordinators, and exposes
//! the two logical calls: single-key mutation and broadcast.

use crate::common::{
    ConsistencyLevel, CoordinatorConfig, CoordinatorMetrics, NodeId, NodeState, Operation,
    Result, ShardRequest, VersionType, WriteLocation,
};
use crate::coordinator::broadcast::{AggregateBroadcastResult, BroadcastCoordinator};
use crate::coordinator::consistency::ShardInfo;
use crate::coordinator::executor::CopyExecutor;
use crate::coordinator::metadata::{CollectionMetadata, CollectionSpec, MetadataService};
use crate::coordinator::provision::{AutoCreatePolicy, ProvisionGuard};
use crate::coordinator::resolver;
use crate::coordinator::topology::{TopologyService, TopologySnapshot};
use crate::coordinator::write::WriteCoordinator;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A single-key mutation as received from a client
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRequest {
    pub collection: String,
    pub id: String,
    pub routing: Option<String>,
    pub operation: Operation,
    pub consistency: ConsistencyLevel,
    /// Falls back to the coordinator's default timeout
    pub timeout: Option<Duration>,
    pub version: Option<u64>,
    pub version_type: VersionType,
}

impl OperationRequest {
    pub fn new(collection: impl Into<String>, id: impl Into<String>, operation: Operation) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            routing: None,
            operation,
            consistency: ConsistencyLevel::Default,
            timeout: None,
            version: None,
            version_type: VersionType::Internal,
        }
    }

    pub fn index(
        collection: impl Into<String>,
        id: impl Into<String>,
        source: serde_json::Value,
    ) -> Self {
        Self::new(collection, id, Operation::Index { source })
    }

    pub fn delete(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(collection, id, Operation::Delete)
    }

    pub fn with_routing(mut self, routing: impl Into<String>) -> Self {
        self.routing = Some(routing.into());
        self
    }

    pub fn with_consistency(mut self, consistency: ConsistencyLevel) -> Self {
        self.consistency = consistency;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_version(mut self, version: u64, version_type: VersionType) -> Self {
        self.version = Some(version);
        self.version_type = version_type;
        self
    }

    /// Checks that need neither metadata nor topology
    fn validate(&self) -> Result<()> {
        if !self.operation.is_single_key() {
            return Err(crate::Error::InvalidRequest(format!(
                "{} is not a single-key operation",
                self.operation.name()
            )));
        }
        if self.collection.is_empty() {
            return Err(crate::Error::InvalidRequest("collection is required".into()));
        }
        if self.version_type != VersionType::Internal && self.version.is_none() {
            return Err(crate::Error::InvalidRequest(format!(
                "version_type [{}] requires a version",
                self.version_type
            )));
        }
        Ok(())
    }
}

/// A partition-wide operation on a whole collection
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastRequest {
    pub collection: String,
    pub operation: Operation,
    /// Each partition is executed on its primary only; the level is carried
    /// for parity with single-key requests and recorded in the logs.
    pub consistency: ConsistencyLevel,
    pub timeout: Option<Duration>,
}

impl BroadcastRequest {
    pub fn rebuild(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            operation: Operation::Rebuild,
            consistency: ConsistencyLevel::Default,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Answer to an acknowledged single-key mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResponse {
    pub collection: String,
    pub id: String,
    pub location: WriteLocation,
    pub shards: ShardInfo,
}

pub struct Coordinator {
    metadata: Arc<dyn MetadataService>,
    topology: Arc<dyn TopologyService>,
    provision: ProvisionGuard,
    writes: WriteCoordinator,
    broadcasts: BroadcastCoordinator,
    metrics: Arc<CoordinatorMetrics>,
    default_consistency: ConsistencyLevel,
    default_timeout: Duration,
    default_partitions: u32,
    default_replicas: usize,
}

impl Coordinator {
    pub fn new(
        config: &CoordinatorConfig,
        metadata: Arc<dyn MetadataService>,
        topology: Arc<dyn TopologyService>,
        executor: Arc<dyn CopyExecutor>,
    ) -> Result<Self> {
        let policy: AutoCreatePolicy = config.auto_create.parse()?;
        let metrics = Arc::new(CoordinatorMetrics::new());
        Ok(Self {
            provision: ProvisionGuard::new(
                metadata.clone(),
                policy,
                config.default_partitions,
                config.replicas,
                metrics.clone(),
            ),
            writes: WriteCoordinator::new(executor.clone(), metrics.clone()),
            broadcasts: BroadcastCoordinator::new(executor, metrics.clone()),
            metadata,
            topology,
            metrics,
            default_consistency: config.default_consistency.or(ConsistencyLevel::Quorum),
            default_timeout: config.default_timeout(),
            default_partitions: config.default_partitions,
            default_replicas: config.replicas,
        })
    }

    pub fn metrics(&self) -> Arc<CoordinatorMetrics> {
        self.metrics.clone()
    }

    pub fn default_partitions(&self) -> u32 {
        self.default_partitions
    }

    pub fn default_replicas(&self) -> usize {
        self.default_replicas
    }

    /// Apply a single-key mutation and wait for the required acknowledgements
    pub async fn single_key_mutate(&self, request: OperationRequest) -> Result<WriteResponse> {
        self.metrics.single_key_requests.inc();
        let start = Instant::now();

        let result = self.mutate(request).await;

        self.metrics.write_latency.observe_duration(start.elapsed());
        if let Err(e) = &result {
            self.metrics.single_key_failures.inc();
            if e.is_validation() {
                self.metrics.validation_failures.inc();
            }
        }
        result
    }

    async fn mutate(&self, request: OperationRequest) -> Result<WriteResponse> {
        request.validate()?;

        let ensured = self.provision.ensure_collection(&request.collection).await?;
        let partition_id = resolver::resolve(
            &ensured.metadata,
            &request.id,
            request.routing.as_deref(),
            request.version_type,
        )?;

        let snapshot = self.topology.snapshot().await?;
        let partition =
            snapshot
                .partition(&partition_id)
                .ok_or_else(|| crate::Error::PrimaryUnavailable {
                    partition: partition_id.clone(),
                    reason: format!("partition not in topology v{}", snapshot.version),
                })?;

        let level = request.consistency.or(self.default_consistency);
        let timeout = request.timeout.unwrap_or(self.default_timeout);
        let shard_request = ShardRequest {
            partition: partition_id,
            doc_id: Some(request.id.clone()),
            operation: request.operation,
            version: request.version,
            version_type: request.version_type,
            replicated_version: None,
        };

        let outcome = self
            .writes
            .execute(partition, shard_request, level, timeout)
            .await?;
        Ok(WriteResponse {
            collection: request.collection,
            id: request.id,
            location: outcome.location,
            shards: outcome.shards,
        })
    }

    /// Run a partition-wide operation on every partition of a collection.
    ///
    /// Fails only when the collection cannot be resolved; partition failures
    /// are reported inside the result.
    pub async fn broadcast(&self, request: BroadcastRequest) -> Result<AggregateBroadcastResult> {
        if request.operation.is_single_key() {
            return Err(crate::Error::InvalidRequest(format!(
                "{} is not a partition-wide operation",
                request.operation.name()
            )));
        }
        if self.metadata.get(&request.collection).await?.is_none() {
            return Err(crate::Error::CollectionNotFound(request.collection));
        }

        let snapshot = self.topology.snapshot().await?;
        let timeout = request.timeout.unwrap_or(self.default_timeout);
        tracing::debug!(
            "Broadcast {} on [{}] at {}",
            request.operation.name(),
            request.collection,
            request.consistency.or(self.default_consistency)
        );
        self.broadcasts
            .execute(&snapshot, &request.collection, request.operation, timeout)
            .await
    }

    /// Create a collection explicitly
    pub async fn create_collection(&self, spec: CollectionSpec) -> Result<CollectionMetadata> {
        let metadata = self.metadata.create(spec).await?;
        tracing::info!(
            "Created collection [{}] ({} partitions, {} copies)",
            metadata.name,
            metadata.partitions,
            metadata.replicas
        );
        Ok(metadata)
    }

    pub async fn collections(&self) -> Result<Vec<CollectionMetadata>> {
        self.metadata.list().await
    }

    pub async fn topology(&self) -> Result<Arc<TopologySnapshot>> {
        self.topology.snapshot().await
    }

    pub async fn set_node_state(&self, node: &NodeId, state: NodeState) -> Result<()> {
        self.topology.set_node_state(node, state).await
    }
}
