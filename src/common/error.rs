//! Error types for minidoc

use crate::common::types::{FailureKind, PartitionId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Validation Errors ===
    #[error("routing is required for [{collection}]/[{id}]")]
    RoutingRequired { collection: String, id: String },

    #[error("routing value is required for [{collection}]/[{id}] while using version_type [{version_type}]")]
    UnsupportedCombination {
        collection: String,
        id: String,
        version_type: String,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // === Collection Errors ===
    #[error("no such collection [{0}]")]
    CollectionNotFound(String),

    #[error("collection [{0}] already exists")]
    AlreadyExists(String),

    // === Copy Errors ===
    #[error("primary copy of {partition} is not available: {reason}")]
    PrimaryUnavailable {
        partition: PartitionId,
        reason: String,
    },

    #[error("copy on node [{node}] is unreachable: {reason}")]
    CopyUnreachable { node: String, reason: String },

    /// The primary may have applied the write even though too few copies
    /// acknowledged it: the mutation can be durable without being acknowledged.
    #[error("{partition}: {acknowledged} of {total} copies acknowledged, {required} required")]
    QuorumUnmet {
        partition: PartitionId,
        required: usize,
        acknowledged: usize,
        total: usize,
    },

    #[error("Partition not found on copy: {0}")]
    ShardNotFound(String),

    #[error("version conflict for [{id}]: current version [{current}], provided [{provided}]")]
    VersionConflict {
        id: String,
        current: u64,
        provided: u64,
    },

    #[error("Version conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // === Network Errors ===
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    // === Metadata Errors ===
    #[cfg(feature = "rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("Metadata corrupted: {0}")]
    MetadataCorrupted(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation timeout: {0}")]
    Timeout(String),
}

impl Error {
    /// Is this a retryable error?
    ///
    /// Nothing in the coordinator retries; this is a hint for client loops.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Timeout(_)
                | Error::ConnectionFailed(_)
                | Error::CopyUnreachable { .. }
                | Error::PrimaryUnavailable { .. }
                | Error::QuorumUnmet { .. }
        )
    }

    /// Caller errors that must never reach a remote copy
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::RoutingRequired { .. }
                | Error::UnsupportedCombination { .. }
                | Error::InvalidRequest(_)
        )
    }

    /// Classify this error for per-copy and per-partition failure records
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Error::Timeout(_) => FailureKind::Timeout,
            Error::CopyUnreachable { .. } | Error::ConnectionFailed(_) => FailureKind::Unreachable,
            Error::PrimaryUnavailable { .. } => FailureKind::PrimaryUnavailable,
            Error::ShardNotFound(_) => FailureKind::ResolvedAway,
            Error::VersionConflict { .. } | Error::Conflict(_) => FailureKind::VersionConflict,
            Error::RoutingRequired { .. }
            | Error::UnsupportedCombination { .. }
            | Error::InvalidRequest(_) => FailureKind::Validation,
            Error::Storage(_) | Error::Io(_) => FailureKind::Storage,
            _ => FailureKind::Internal,
        }
    }

    /// Short machine-readable name used in HTTP error bodies
    pub fn type_name(&self) -> &'static str {
        match self {
            Error::RoutingRequired { .. } => "routing_missing_exception",
            Error::UnsupportedCombination { .. } => "illegal_argument_exception",
            Error::InvalidRequest(_) => "invalid_request_exception",
            Error::CollectionNotFound(_) => "collection_not_found_exception",
            Error::AlreadyExists(_) => "collection_already_exists_exception",
            Error::PrimaryUnavailable { .. } => "primary_unavailable_exception",
            Error::CopyUnreachable { .. } | Error::ConnectionFailed(_) => {
                "copy_unreachable_exception"
            }
            Error::QuorumUnmet { .. } => "quorum_unmet_exception",
            Error::ShardNotFound(_) => "shard_not_found_exception",
            Error::VersionConflict { .. } | Error::Conflict(_) => "version_conflict_exception",
            Error::Timeout(_) => "timeout_exception",
            Error::Storage(_) | Error::Io(_) => "storage_exception",
            _ => "internal_exception",
        }
    }

    /// Rebuild an error reported by a remote node from its failure kind
    pub fn from_remote(kind: FailureKind, node: &str, reason: String) -> Self {
        match kind {
            FailureKind::Timeout => Error::Timeout(reason),
            FailureKind::Unreachable => Error::CopyUnreachable {
                node: node.to_string(),
                reason,
            },
            FailureKind::ResolvedAway => Error::ShardNotFound(reason),
            FailureKind::Validation => Error::InvalidRequest(reason),
            FailureKind::VersionConflict => Error::Conflict(reason),
            FailureKind::Storage => Error::Storage(reason),
            FailureKind::PrimaryUnavailable | FailureKind::Internal => Error::Internal(reason),
        }
    }

    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Error::RoutingRequired { .. }
            | Error::UnsupportedCombination { .. }
            | Error::InvalidRequest(_)
            | Error::InvalidConfig(_)
            | Error::AlreadyExists(_) => StatusCode::BAD_REQUEST,
            Error::CollectionNotFound(_) | Error::ShardNotFound(_) => StatusCode::NOT_FOUND,
            Error::VersionConflict { .. } | Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            Error::PrimaryUnavailable { .. }
            | Error::CopyUnreachable { .. }
            | Error::ConnectionFailed(_)
            | Error::QuorumUnmet { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else if e.is_connect() {
            Error::ConnectionFailed(e.to_string())
        } else {
            Error::Http(e.to_string())
        }
    }
}
