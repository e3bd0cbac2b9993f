//! # minidoc
//!
//! Write and broadcast coordination for a partitioned, replicated document
//! store:
//! - Partition resolution with required-routing validation
//! - Single-key writes on the primary copy, replicated to secondaries
//!   until the consistency level is met
//! - Broadcast of partition-wide operations with per-partition failures
//! - Collection auto-provisioning that tolerates concurrent creators
//!
//! ## Architecture
//!
//! ```text
//!            ┌──────────────────────────────────────┐
//!  client ──▶│             Coordinator              │
//!            │ provision → resolve → snapshot       │
//!            │   → write coordinator / broadcast    │
//!            └───────────┬──────────────────────────┘
//!                        │ HTTP (/_internal/apply)
//!   ┌────────────────────┼────────────────────┐
//!   │                    │                    │
//! ┌─▼──────────┐   ┌─────▼──────┐   ┌─────────▼──┐
//! │ Node 1     │   │ Node 2     │   │ Node 3     │
//! │ [logs][0]P │   │ [logs][0]R │   │ [logs][1]P │
//! └────────────┘   └────────────┘   └────────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start a coordinator with three embedded nodes
//! ```bash
//! minidoc-coord serve --bind 0.0.0.0:5000 --embedded-nodes 3
//! ```
//!
//! ### Start remote nodes
//! ```bash
//! minidoc-node --id node-1 --bind 0.0.0.0:6000
//! ```
//! and list them in `minidoc.toml` under `[[coordinator.nodes]]`.
//!
//! ### Use the CLI
//! ```bash
//! minidoc create logs --partitions 4 --replicas 3
//! minidoc index logs 1 --source '{"msg":"hello"}' --consistency all
//! minidoc delete logs 1
//! minidoc rebuild logs --timeout 30s
//! ```

#![allow(clippy::result_large_err)]

pub mod common;
pub mod coordinator;
pub mod node;
pub mod ops;

// Re-export commonly used types
pub use common::{Config, Error, Result};
pub use coordinator::{Coordinator, CoordinatorServer};
pub use node::NodeServer;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
