//! Copy-hosting node
//!
//! A node holds copies of partitions and applies the requests the
//! coordinator sends it. It has no routing logic of its own.

pub mod engine;
pub mod http;
pub mod server;

pub use engine::DocumentStore;
pub use server::NodeServer;
