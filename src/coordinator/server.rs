//! Coordinator server

use crate::common::{CoordinatorConfig, NodeEndpoint, NodeId, Result};
use crate::coordinator::executor::{CopyExecutor, HttpExecutor, LocalExecutor};
use crate::coordinator::http::{create_router, CoordState};
use crate::coordinator::metadata::{MemoryMetadata, MetadataService};
use crate::coordinator::service::Coordinator;
use crate::coordinator::topology::PlacementTopology;
use std::sync::Arc;
use std::time::Duration;

const NODE_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct CoordinatorServer {
    config: CoordinatorConfig,
}

impl CoordinatorServer {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self { config }
    }

    fn open_metadata(&self) -> Result<Arc<dyn MetadataService>> {
        match &self.config.metadata_path {
            #[cfg(feature = "rocksdb")]
            Some(path) => {
                tracing::info!("  Metadata: {}", path.display());
                Ok(Arc::new(
                    crate::coordinator::metadata::RocksMetadataStore::open(path)?,
                ))
            }
            #[cfg(not(feature = "rocksdb"))]
            Some(path) => Err(crate::Error::InvalidConfig(format!(
                "metadata_path {} requires the rocksdb feature",
                path.display()
            ))),
            None => {
                tracing::info!("  Metadata: in memory");
                Ok(Arc::new(MemoryMetadata::new()))
            }
        }
    }

    /// Node endpoints and the executor reaching them.
    ///
    /// Without configured nodes, `embedded_nodes` in-process stores are used.
    fn connect_nodes(&self) -> Result<(Vec<NodeEndpoint>, Arc<dyn CopyExecutor>)> {
        if self.config.nodes.is_empty() {
            let endpoints: Vec<NodeEndpoint> = (1..=self.config.embedded_nodes)
                .map(|i| NodeEndpoint {
                    id: NodeId::new(format!("node-{}", i)),
                    address: "embedded".into(),
                })
                .collect();
            tracing::info!("  Nodes: {} embedded", endpoints.len());
            let executor = LocalExecutor::with_nodes(endpoints.iter().map(|e| e.id.clone()));
            return Ok((endpoints, Arc::new(executor)));
        }

        for node in &self.config.nodes {
            tracing::info!("  Node {}: {}", node.id, node.address);
        }
        let executor = HttpExecutor::new(&self.config.nodes, NODE_CONNECT_TIMEOUT)?;
        Ok((self.config.nodes.clone(), Arc::new(executor)))
    }

    /// Wire metadata, topology and executor into a `Coordinator`
    pub fn build(&self) -> Result<Arc<Coordinator>> {
        self.config.validate()?;
        let metadata = self.open_metadata()?;
        let (endpoints, executor) = self.connect_nodes()?;
        let topology = Arc::new(PlacementTopology::from_endpoints(
            &endpoints,
            metadata.clone(),
        ));
        Ok(Arc::new(Coordinator::new(
            &self.config,
            metadata,
            topology,
            executor,
        )?))
    }

    pub async fn serve(self) -> Result<()> {
        tracing::info!("Starting coordinator");
        tracing::info!("  HTTP API: {}", self.config.bind_addr);
        tracing::info!("  Replicas: {}", self.config.replicas);
        tracing::info!("  Default consistency: {}", self.config.default_consistency);
        tracing::info!("  Auto-create: {}", self.config.auto_create);

        let coordinator = self.build()?;
        let router = create_router(CoordState { coordinator }, self.config.max_body_bytes);

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!("✓ Coordinator ready");

        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            tracing::error!("HTTP server error: {}", e);
        }
        tracing::info!("Coordinator stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
