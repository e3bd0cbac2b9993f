//! Node server

use crate::common::{NodeConfig, NodeId, Result};
use crate::node::engine::DocumentStore;
use crate::node::http::{create_router, NodeHttpState};
use std::sync::Arc;

pub struct NodeServer {
    config: NodeConfig,
    node_id: NodeId,
}

impl NodeServer {
    pub fn new(config: NodeConfig, node_id: NodeId) -> Self {
        Self { config, node_id }
    }

    pub async fn serve(self) -> Result<()> {
        tracing::info!("Starting node: {}", self.node_id);
        tracing::info!("  HTTP API: {}", self.config.bind_addr);

        let store = Arc::new(DocumentStore::new(self.node_id.clone()));
        let router = create_router(NodeHttpState { store }, self.config.max_body_bytes);

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!("✓ Node ready");

        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!("HTTP server error: {}", e);
        }
        Ok(())
    }
}
