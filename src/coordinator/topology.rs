//! Cluster topology: which nodes host which partition copies
//!
//! Every operation reads one `TopologySnapshot` and keeps it for all of its
//! routing decisions; a topology change while the operation is in flight is
//! only visible to operations that start afterwards.

use crate::common::{
    select_replicas, CopyRole, NodeEndpoint, NodeId, NodeState, PartitionId, Result,
};
use crate::coordinator::metadata::{CollectionMetadata, MetadataService};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// One stored instance of a partition on a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardCopy {
    pub partition: PartitionId,
    pub node: NodeId,
    pub role: CopyRole,
    pub state: NodeState,
}

impl ShardCopy {
    pub fn is_primary(&self) -> bool {
        self.role == CopyRole::Primary
    }
}

/// A partition and its copy set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub id: PartitionId,
    pub copies: Vec<ShardCopy>,
}

impl Partition {
    pub fn primaries(&self) -> impl Iterator<Item = &ShardCopy> {
        self.copies.iter().filter(|c| c.is_primary())
    }

    pub fn secondaries(&self) -> impl Iterator<Item = &ShardCopy> {
        self.copies.iter().filter(|c| !c.is_primary())
    }
}

/// Point-in-time view of the partitions of every collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub version: u64,
    pub collections: BTreeMap<String, Vec<Partition>>,
}

impl TopologySnapshot {
    pub fn new(version: u64) -> Self {
        Self {
            version,
            collections: BTreeMap::new(),
        }
    }

    /// Builder used by tests and static layouts
    pub fn with_collection(mut self, name: impl Into<String>, partitions: Vec<Partition>) -> Self {
        self.collections.insert(name.into(), partitions);
        self
    }

    pub fn partitions_of(&self, collection: &str) -> Option<&[Partition]> {
        self.collections.get(collection).map(|p| p.as_slice())
    }

    pub fn partition(&self, id: &PartitionId) -> Option<&Partition> {
        self.collections
            .get(&id.collection)?
            .iter()
            .find(|p| p.id.shard == id.shard)
    }

    /// Copies of a partition; empty when the partition is unknown
    pub fn copies_of(&self, id: &PartitionId) -> &[ShardCopy] {
        self.partition(id).map(|p| p.copies.as_slice()).unwrap_or(&[])
    }
}

/// Source of topology snapshots
#[async_trait]
pub trait TopologyService: Send + Sync {
    async fn snapshot(&self) -> Result<Arc<TopologySnapshot>>;

    /// Record a member's health; only topologies that track members support it
    async fn set_node_state(&self, node: &NodeId, _state: NodeState) -> Result<()> {
        Err(crate::Error::InvalidRequest(format!(
            "topology does not track node [{}]",
            node
        )))
    }
}

/// Topology service returning a fixed snapshot
pub struct StaticTopology {
    snapshot: Arc<TopologySnapshot>,
}

impl StaticTopology {
    pub fn new(snapshot: TopologySnapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
        }
    }
}

#[async_trait]
impl TopologyService for StaticTopology {
    async fn snapshot(&self) -> Result<Arc<TopologySnapshot>> {
        Ok(self.snapshot.clone())
    }
}

/// A cluster member and its health
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: NodeId,
    pub address: String,
    pub state: NodeState,
}

/// Topology derived from the member list and the collection metadata.
///
/// The copies of `collection/shard-N` are the first `replicas` members in HRW
/// order for that key. The first healthy one in that order is the primary, so
/// marking a node dead promotes the next copy in the following snapshot.
pub struct PlacementTopology {
    members: RwLock<Vec<Member>>,
    metadata: Arc<dyn MetadataService>,
    version: AtomicU64,
}

impl PlacementTopology {
    pub fn new(members: Vec<Member>, metadata: Arc<dyn MetadataService>) -> Self {
        Self {
            members: RwLock::new(members),
            metadata,
            version: AtomicU64::new(1),
        }
    }

    pub fn from_endpoints(endpoints: &[NodeEndpoint], metadata: Arc<dyn MetadataService>) -> Self {
        let members = endpoints
            .iter()
            .map(|e| Member {
                id: e.id.clone(),
                address: e.address.clone(),
                state: NodeState::Alive,
            })
            .collect();
        Self::new(members, metadata)
    }

    pub fn members(&self) -> Result<Vec<Member>> {
        self.members
            .read()
            .map(|m| m.clone())
            .map_err(|_| crate::Error::Internal("topology lock poisoned".into()))
    }

    /// Change a member's state; bumps the topology version
    pub fn update_member(&self, node: &NodeId, state: NodeState) -> Result<()> {
        let mut members = self
            .members
            .write()
            .map_err(|_| crate::Error::Internal("topology lock poisoned".into()))?;
        let member = members
            .iter_mut()
            .find(|m| &m.id == node)
            .ok_or_else(|| crate::Error::InvalidRequest(format!("unknown node [{}]", node)))?;
        if member.state != state {
            tracing::info!("Node {} state {:?} -> {:?}", node, member.state, state);
            member.state = state;
            self.version.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn layout(collection: &CollectionMetadata, members: &[Member]) -> Vec<Partition> {
        let ids: Vec<String> = members.iter().map(|m| m.id.0.clone()).collect();
        (0..collection.partitions)
            .map(|shard| {
                let id = PartitionId::new(collection.name.clone(), shard);
                let key = format!("{}/shard-{}", collection.name, shard);
                let placed: Vec<&Member> = select_replicas(&key, &ids, collection.replicas)
                    .into_iter()
                    .filter_map(|node| members.iter().find(|m| m.id.0 == node))
                    .collect();
                let primary = placed.iter().position(|m| m.state.is_healthy());
                let copies = placed
                    .iter()
                    .enumerate()
                    .map(|(i, m)| ShardCopy {
                        partition: id.clone(),
                        node: m.id.clone(),
                        role: if Some(i) == primary {
                            CopyRole::Primary
                        } else {
                            CopyRole::Secondary
                        },
                        state: m.state,
                    })
                    .collect();
                Partition { id, copies }
            })
            .collect()
    }
}

#[async_trait]
impl TopologyService for PlacementTopology {
    async fn snapshot(&self) -> Result<Arc<TopologySnapshot>> {
        let collections = self.metadata.list().await?;
        let members = self.members()?;
        let mut snapshot = TopologySnapshot::new(self.version.load(Ordering::SeqCst));
        for collection in &collections {
            snapshot
                .collections
                .insert(collection.name.clone(), Self::layout(collection, &members));
        }
        Ok(Arc::new(snapshot))
    }

    async fn set_node_state(&self, node: &NodeId, state: NodeState) -> Result<()> {
        self.update_member(node, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::metadata::{CollectionSpec, MemoryMetadata};

    fn member(id: &str) -> Member {
        Member {
            id: NodeId::new(id),
            address: format!("http://{}:6000", id),
            state: NodeState::Alive,
        }
    }

    async fn topology_with(collection: CollectionSpec, nodes: &[&str]) -> PlacementTopology {
        let metadata = Arc::new(MemoryMetadata::new());
        metadata.create(collection).await.unwrap();
        PlacementTopology::new(nodes.iter().map(|n| member(n)).collect(), metadata)
    }

    #[tokio::test]
    async fn test_every_partition_has_one_primary() {
        let topology =
            topology_with(CollectionSpec::new("articles", 8, 3), &["n1", "n2", "n3", "n4"]).await;
        let snapshot = topology.snapshot().await.unwrap();

        let partitions = snapshot.partitions_of("articles").unwrap();
        assert_eq!(partitions.len(), 8);
        for partition in partitions {
            assert_eq!(partition.copies.len(), 3);
            assert_eq!(partition.primaries().count(), 1);
            assert_eq!(partition.secondaries().count(), 2);
        }
    }

    #[tokio::test]
    async fn test_snapshot_is_deterministic() {
        let topology =
            topology_with(CollectionSpec::new("articles", 4, 2), &["n1", "n2", "n3"]).await;
        let a = topology.snapshot().await.unwrap();
        let b = topology.snapshot().await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_dead_primary_is_replaced() {
        let topology =
            topology_with(CollectionSpec::new("articles", 1, 3), &["n1", "n2", "n3"]).await;
        let before = topology.snapshot().await.unwrap();
        let pid = PartitionId::new("articles", 0);
        let old_primary = before.partition(&pid).unwrap().primaries().next().unwrap().node.clone();

        topology.update_member(&old_primary, NodeState::Dead).unwrap();
        let after = topology.snapshot().await.unwrap();

        assert!(after.version > before.version);
        let partition = after.partition(&pid).unwrap();
        let new_primary = partition.primaries().next().unwrap();
        assert_ne!(new_primary.node, old_primary);
        assert!(new_primary.state.is_healthy());

        // The dead copy is still part of the copy set, as a secondary
        let dead = partition.copies.iter().find(|c| c.node == old_primary).unwrap();
        assert_eq!(dead.role, CopyRole::Secondary);
        assert_eq!(dead.state, NodeState::Dead);

        // Snapshots taken earlier are unaffected
        assert_eq!(
            before.partition(&pid).unwrap().primaries().next().unwrap().node,
            old_primary
        );
    }

    #[tokio::test]
    async fn test_no_primary_when_all_copies_down() {
        let topology = topology_with(CollectionSpec::new("logs", 1, 2), &["n1", "n2"]).await;
        topology.update_member(&NodeId::new("n1"), NodeState::Dead).unwrap();
        topology.update_member(&NodeId::new("n2"), NodeState::Dead).unwrap();

        let snapshot = topology.snapshot().await.unwrap();
        let pid = PartitionId::new("logs", 0);
        assert_eq!(snapshot.partition(&pid).unwrap().primaries().count(), 0);
        assert_eq!(snapshot.copies_of(&pid).len(), 2);
    }

    #[tokio::test]
    async fn test_fewer_members_than_replicas() {
        let topology = topology_with(CollectionSpec::new("logs", 2, 3), &["n1"]).await;
        let snapshot = topology.snapshot().await.unwrap();
        assert_eq!(snapshot.copies_of(&PartitionId::new("logs", 1)).len(), 1);
        assert!(snapshot.copies_of(&PartitionId::new("logs", 9)).is_empty());
        assert!(snapshot.partitions_of("missing").is_none());
    }

    #[tokio::test]
    async fn test_poisoned_member_list_is_reported() {
        let topology =
            Arc::new(topology_with(CollectionSpec::new("logs", 2, 2), &["n1", "n2"]).await);
        let writer = topology.clone();
        let _ = std::thread::spawn(move || {
            let _members = writer.members.write().unwrap();
            panic!("writer died holding the member list");
        })
        .join();

        assert!(matches!(topology.members(), Err(crate::Error::Internal(_))));
        let err = topology.snapshot().await.unwrap_err();
        assert!(matches!(err, crate::Error::Internal(_)));
    }

    #[tokio::test]
    async fn test_unknown_node_state_change() {
        let topology = PlacementTopology::new(vec![member("n1")], Arc::new(MemoryMetadata::new()));
        assert!(topology
            .set_node_state(&NodeId::new("n9"), NodeState::Dead)
            .await
            .is_err());

        let fixed = StaticTopology::new(TopologySnapshot::new(1));
        assert!(fixed
            .set_node_state(&NodeId::new("n1"), NodeState::Dead)
            .await
            .is_err());
    }
}
