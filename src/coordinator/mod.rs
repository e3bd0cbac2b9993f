//! Write and broadcast coordination
//!
//! The coordinator is responsible for:
//! - Auto-provisioning collections on first write
//! - Resolving a single-key operation to its partition
//! - Executing it on the primary copy and replicating to secondaries
//! - Fanning partition-wide operations out to every partition
//!
//! Metadata, topology and per-copy execution are collaborators behind traits.

pub mod broadcast;
pub mod consistency;
pub mod executor;
pub mod http;
pub mod metadata;
pub mod provision;
pub mod resolver;
pub mod server;
pub mod service;
pub mod topology;
pub mod write;

pub use server::CoordinatorServer;
pub use service::{BroadcastRequest, Coordinator, OperationRequest, WriteResponse};
