//! In-memory document engine for the copies hosted on one node
//!
//! Each partition copy keeps its documents and a sequence number that is
//! bumped by every applied mutation. Version guards are checked on the
//! primary path only; secondaries install the version the primary assigned.
//!
//! Replicated mutations can arrive out of order, so deletes leave a
//! tombstone holding their version and a secondary skips any replicated
//! version older than the latest one it has seen for the document.

use crate::common::{
    ApplyResult, NodeId, Operation, PartitionId, Result, ShardRequest, VersionType, WriteLocation,
};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct StoredDoc {
    version: u64,
    source: serde_json::Value,
}

#[derive(Debug, Default)]
struct PartitionData {
    docs: HashMap<String, StoredDoc>,
    /// Version of the delete that removed a document
    tombstones: HashMap<String, u64>,
    seq_no: u64,
}

impl PartitionData {
    /// Highest version seen for a document, live or deleted
    fn latest_version(&self, id: &str) -> Option<u64> {
        let live = self.docs.get(id).map(|d| d.version);
        live.max(self.tombstones.get(id).copied())
    }
}

/// Documents of all partition copies hosted on a node
#[derive(Debug)]
pub struct DocumentStore {
    node: NodeId,
    partitions: Mutex<HashMap<PartitionId, PartitionData>>,
}

impl DocumentStore {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            partitions: Mutex::new(HashMap::new()),
        }
    }

    pub fn node(&self) -> &NodeId {
        &self.node
    }

    /// Apply one shard request to the local copy of its partition
    pub fn apply(&self, request: &ShardRequest) -> Result<WriteLocation> {
        let mut partitions = self
            .partitions
            .lock()
            .map_err(|_| crate::Error::Storage("document store lock poisoned".into()))?;
        let data = partitions.entry(request.partition.clone()).or_default();

        if let (Some(id), Some(replicated)) = (request.doc_id.as_deref(), request.replicated_version)
        {
            if let Some(latest) = data.latest_version(id) {
                if is_stale(replicated, latest, request.version_type) {
                    tracing::debug!(
                        "Skipping stale replica write of [{}] on {}: v{} <= v{}",
                        id,
                        request.partition,
                        replicated,
                        latest
                    );
                    return Ok(WriteLocation {
                        partition: request.partition.clone(),
                        node: self.node.clone(),
                        seq_no: data.seq_no,
                        version: latest,
                        result: ApplyResult::Noop,
                    });
                }
            }
        }

        let (version, result) = match &request.operation {
            Operation::Index { source } => {
                let id = doc_id(request)?;
                let current = data.docs.get(id).map(|d| d.version);
                let version = match request.replicated_version {
                    Some(v) => v,
                    None => next_version(id, current, data.latest_version(id), request)?,
                };
                data.tombstones.remove(id);
                data.docs.insert(
                    id.to_string(),
                    StoredDoc {
                        version,
                        source: source.clone(),
                    },
                );
                let result = if current.is_some() {
                    ApplyResult::Updated
                } else {
                    ApplyResult::Created
                };
                (version, result)
            }
            Operation::Delete => {
                let id = doc_id(request)?;
                let current = data.docs.get(id).map(|d| d.version);
                let version = match request.replicated_version {
                    Some(v) => v,
                    None => next_version(id, current, data.latest_version(id), request)?,
                };
                data.tombstones.insert(id.to_string(), version);
                match data.docs.remove(id) {
                    Some(_) => (version, ApplyResult::Deleted),
                    None => (version, ApplyResult::NotFound),
                }
            }
            Operation::Rebuild => {
                let docs = data.docs.len() as u64;
                tracing::debug!(
                    "Rebuilt {} on {} ({} docs)",
                    request.partition,
                    self.node,
                    docs
                );
                (0, ApplyResult::Rebuilt { docs })
            }
        };

        data.seq_no += 1;
        Ok(WriteLocation {
            partition: request.partition.clone(),
            node: self.node.clone(),
            seq_no: data.seq_no,
            version,
            result,
        })
    }

    /// Source of a document on this copy
    pub fn get(&self, partition: &PartitionId, id: &str) -> Option<(u64, serde_json::Value)> {
        let partitions = self.partitions.lock().ok()?;
        partitions
            .get(partition)?
            .docs
            .get(id)
            .map(|d| (d.version, d.source.clone()))
    }

    /// Number of documents in the local copy of a partition
    pub fn doc_count(&self, partition: &PartitionId) -> usize {
        self.partitions
            .lock()
            .map(|p| p.get(partition).map_or(0, |d| d.docs.len()))
            .unwrap_or(0)
    }
}

fn doc_id(request: &ShardRequest) -> Result<&str> {
    request
        .doc_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            crate::Error::InvalidRequest(format!(
                "{} requires a document id",
                request.operation.name()
            ))
        })
}

/// A replicated version at or below the latest one is a reordered or
/// duplicate delivery. `ExternalGte` writes may legitimately reuse a version.
fn is_stale(replicated: u64, latest: u64, version_type: VersionType) -> bool {
    replicated < latest || (replicated == latest && version_type != VersionType::ExternalGte)
}

/// Version a primary assigns to a mutation, after checking the version guard.
///
/// `current` is the live document's version; `latest` also covers a deleted
/// one, so a re-created document never reuses a version its replicas saw.
fn next_version(
    id: &str,
    current: Option<u64>,
    latest: Option<u64>,
    request: &ShardRequest,
) -> Result<u64> {
    let conflict = |current: u64, provided: u64| crate::Error::VersionConflict {
        id: id.to_string(),
        current,
        provided,
    };

    match request.version_type {
        VersionType::Internal => match (request.version, current) {
            (Some(expected), Some(cur)) if expected != cur => Err(conflict(cur, expected)),
            (Some(expected), None) => Err(conflict(0, expected)),
            _ => Ok(latest.unwrap_or(0) + 1),
        },
        VersionType::External | VersionType::ExternalGte => {
            let provided = request.version.ok_or_else(|| {
                crate::Error::InvalidRequest(format!(
                    "version_type [{}] requires a version",
                    request.version_type
                ))
            })?;
            let accepted = match (request.version_type, latest) {
                (_, None) => true,
                (VersionType::External, Some(cur)) => provided > cur,
                (_, Some(cur)) => provided >= cur,
            };
            if accepted {
                Ok(provided)
            } else {
                Err(conflict(latest.unwrap_or(0), provided))
            }
        }
    }
}
