//! Common utilities and types shared across minidoc

pub mod config;
pub mod error;
pub mod hash;
pub mod metrics;
pub mod tracing_middleware;
pub mod types;
pub mod utils;

pub use config::{Config, CoordinatorConfig, NodeConfig, NodeEndpoint};
pub use error::{Error, Result};
pub use hash::{hrw_hash, select_replicas, shard_key};
pub use metrics::CoordinatorMetrics;
pub use types::{
    ApplyResult, ConsistencyLevel, CopyRole, FailureKind, NodeId, Operation, PartitionId,
    ShardFailure, ShardOperationResult, ShardRequest, VersionType, WriteLocation,
};
pub use utils::{encode_path_segment, parse_duration, timestamp_now_millis, NodeState};
