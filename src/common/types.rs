//! Core value types shared by the coordinator and the nodes
//!
//! These are plain data: identifiers, roles, consistency levels, the
//! operation variants the coordinator can dispatch, and the per-copy
//! outcomes it collects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a cluster member hosting partition copies
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A partition (shard) of a collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionId {
    pub collection: String,
    pub shard: u32,
}

impl PartitionId {
    pub fn new(collection: impl Into<String>, shard: u32) -> Self {
        Self {
            collection: collection.into(),
            shard,
        }
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}][{}]", self.collection, self.shard)
    }
}

/// Role of a copy within its partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyRole {
    Primary,
    Secondary,
}

/// How many copies must acknowledge a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsistencyLevel {
    /// Use the coordinator's configured level
    #[default]
    Default,
    One,
    Quorum,
    All,
}

impl ConsistencyLevel {
    /// Replace `Default` by the configured fallback
    pub fn or(self, fallback: ConsistencyLevel) -> ConsistencyLevel {
        match self {
            ConsistencyLevel::Default => fallback,
            level => level,
        }
    }
}

impl FromStr for ConsistencyLevel {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "default" | "" => Ok(ConsistencyLevel::Default),
            "one" => Ok(ConsistencyLevel::One),
            "quorum" => Ok(ConsistencyLevel::Quorum),
            "all" => Ok(ConsistencyLevel::All),
            other => Err(crate::Error::InvalidRequest(format!(
                "unknown consistency level [{}]",
                other
            ))),
        }
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConsistencyLevel::Default => "default",
            ConsistencyLevel::One => "one",
            ConsistencyLevel::Quorum => "quorum",
            ConsistencyLevel::All => "all",
        };
        f.write_str(s)
    }
}

/// Optimistic concurrency control mode of a versioned write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionType {
    /// Versions are assigned by the primary copy
    #[default]
    Internal,
    /// Caller supplies the version; it must be greater than the stored one
    External,
    /// Caller supplies the version; it must be greater than or equal to the stored one
    ExternalGte,
}

impl FromStr for VersionType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "internal" => Ok(VersionType::Internal),
            "external" | "external_gt" => Ok(VersionType::External),
            "external_gte" => Ok(VersionType::ExternalGte),
            other => Err(crate::Error::InvalidRequest(format!(
                "unknown version type [{}]",
                other
            ))),
        }
    }
}

impl fmt::Display for VersionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VersionType::Internal => "internal",
            VersionType::External => "external",
            VersionType::ExternalGte => "external_gte",
        };
        f.write_str(s)
    }
}

/// The operation applied to a copy.
///
/// Single-key variants go through the write coordinator, partition-wide
/// variants through the broadcast aggregator. Both hand the same value to a
/// `CopyExecutor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Operation {
    Index { source: serde_json::Value },
    Delete,
    Rebuild,
}

impl Operation {
    pub fn is_single_key(&self) -> bool {
        matches!(self, Operation::Index { .. } | Operation::Delete)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Index { .. } => "index",
            Operation::Delete => "delete",
            Operation::Rebuild => "rebuild",
        }
    }
}

/// The request sent to one copy of a partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardRequest {
    pub partition: PartitionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(default)]
    pub version_type: VersionType,
    /// Version assigned by the primary; set only on requests to secondaries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicated_version: Option<u64>,
}

impl ShardRequest {
    /// Partition-wide request, as dispatched by a broadcast
    pub fn partition_wide(partition: PartitionId, operation: Operation) -> Self {
        Self {
            partition,
            doc_id: None,
            operation,
            version: None,
            version_type: VersionType::Internal,
            replicated_version: None,
        }
    }

    /// The request a secondary receives after the primary applied this one
    pub fn for_replica(&self, primary: &WriteLocation) -> Self {
        Self {
            replicated_version: Some(primary.version),
            ..self.clone()
        }
    }

    pub fn is_replica(&self) -> bool {
        self.replicated_version.is_some()
    }
}

/// What a copy did with the operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyResult {
    Created,
    Updated,
    Deleted,
    NotFound,
    Rebuilt { docs: u64 },
    /// A replica already holds this version or a newer one
    Noop,
}

impl ApplyResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyResult::Created => "created",
            ApplyResult::Updated => "updated",
            ApplyResult::Deleted => "deleted",
            ApplyResult::NotFound => "not_found",
            ApplyResult::Rebuilt { .. } => "rebuilt",
            ApplyResult::Noop => "noop",
        }
    }
}

/// Location token returned by a successful copy execution.
///
/// `seq_no` is the position of the write in the partition's history on that
/// copy; a follow-up read can use it to wait for the same write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteLocation {
    pub partition: PartitionId,
    pub node: NodeId,
    pub seq_no: u64,
    pub version: u64,
    pub result: ApplyResult,
}

/// Classification of a per-copy or per-partition failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Unreachable,
    PrimaryUnavailable,
    /// The partition no longer exists where the snapshot placed it
    ResolvedAway,
    VersionConflict,
    Validation,
    Storage,
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Unreachable => "unreachable",
            FailureKind::PrimaryUnavailable => "primary_unavailable",
            FailureKind::ResolvedAway => "resolved_away",
            FailureKind::VersionConflict => "version_conflict",
            FailureKind::Validation => "validation",
            FailureKind::Storage => "storage",
            FailureKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// One failed copy (single-key writes) or partition (broadcasts)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardFailure {
    pub partition: PartitionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
    pub kind: FailureKind,
    pub reason: String,
}

impl ShardFailure {
    pub fn new(
        partition: PartitionId,
        node: Option<NodeId>,
        kind: FailureKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            partition,
            node,
            kind,
            reason: reason.into(),
        }
    }

    /// Build a failure record from an error returned for a copy
    pub fn from_error(partition: PartitionId, node: Option<NodeId>, err: &crate::Error) -> Self {
        Self::new(partition, node, err.failure_kind(), err.to_string())
    }
}

/// Outcome of executing an operation on one copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardOperationResult {
    Success(WriteLocation),
    Failure(ShardFailure),
}

impl ShardOperationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ShardOperationResult::Success(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_display() {
        let pid = PartitionId::new("articles", 3);
        assert_eq!(pid.to_string(), "[articles][3]");
    }

    #[test]
    fn test_consistency_parse() {
        assert_eq!("QUORUM".parse::<ConsistencyLevel>().unwrap(), ConsistencyLevel::Quorum);
        assert_eq!("".parse::<ConsistencyLevel>().unwrap(), ConsistencyLevel::Default);
        assert!("two".parse::<ConsistencyLevel>().is_err());
        assert_eq!(ConsistencyLevel::Default.or(ConsistencyLevel::All), ConsistencyLevel::All);
        assert_eq!(ConsistencyLevel::One.or(ConsistencyLevel::All), ConsistencyLevel::One);
    }

    #[test]
    fn test_version_type_parse() {
        assert_eq!("external_gte".parse::<VersionType>().unwrap(), VersionType::ExternalGte);
        assert_eq!("external_gt".parse::<VersionType>().unwrap(), VersionType::External);
        assert!("force".parse::<VersionType>().is_err());
    }

    #[test]
    fn test_replica_request_carries_primary_version() {
        let request = ShardRequest {
            partition: PartitionId::new("a", 1),
            doc_id: Some("7".into()),
            operation: Operation::Delete,
            version: Some(3),
            version_type: VersionType::Internal,
            replicated_version: None,
        };
        let location = WriteLocation {
            partition: PartitionId::new("a", 1),
            node: NodeId::new("n1"),
            seq_no: 12,
            version: 4,
            result: ApplyResult::Deleted,
        };
        let replica = request.for_replica(&location);
        assert!(replica.is_replica());
        assert_eq!(replica.replicated_version, Some(4));
        assert_eq!(replica.doc_id.as_deref(), Some("7"));
        assert!(!request.is_replica());
    }

    #[test]
    fn test_operation_wire_format() {
        let op = Operation::Index {
            source: serde_json::json!({ "title": "x" }),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "index");
        assert!(op.is_single_key());
        assert!(!Operation::Rebuild.is_single_key());
    }
}
