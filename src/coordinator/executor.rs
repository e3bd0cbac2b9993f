//! Per-copy execution
//!
//! `CopyExecutor` is the single seam between the coordinators and the copies:
//! given a copy and a request, apply the request on that copy. Both the write
//! coordinator and the broadcast aggregator take one as `Arc<dyn CopyExecutor>`.

use crate::common::{FailureKind, NodeEndpoint, NodeId, Result, ShardRequest, WriteLocation};
use crate::coordinator::topology::ShardCopy;
use crate::node::DocumentStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Applies a request to one copy of a partition
#[async_trait]
pub trait CopyExecutor: Send + Sync + 'static {
    async fn apply(&self, copy: &ShardCopy, request: &ShardRequest) -> Result<WriteLocation>;
}

/// Executor over document stores living in this process
#[derive(Default, Clone)]
pub struct LocalExecutor {
    stores: HashMap<NodeId, Arc<DocumentStore>>,
}

impl LocalExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor with one fresh store per node id
    pub fn with_nodes<I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = NodeId>,
    {
        let mut executor = Self::new();
        for node in nodes {
            executor.add_store(Arc::new(DocumentStore::new(node)));
        }
        executor
    }

    pub fn add_store(&mut self, store: Arc<DocumentStore>) {
        self.stores.insert(store.node().clone(), store);
    }

    pub fn store(&self, node: &NodeId) -> Option<Arc<DocumentStore>> {
        self.stores.get(node).cloned()
    }
}

#[async_trait]
impl CopyExecutor for LocalExecutor {
    async fn apply(&self, copy: &ShardCopy, request: &ShardRequest) -> Result<WriteLocation> {
        let store = self
            .stores
            .get(&copy.node)
            .ok_or_else(|| crate::Error::CopyUnreachable {
                node: copy.node.to_string(),
                reason: "no local store for node".into(),
            })?;
        store.apply(request)
    }
}

/// Body of `POST /_internal/apply`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyEnvelope {
    pub copy: ShardCopy,
    pub request: ShardRequest,
}

/// Error body returned by a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteError {
    pub kind: FailureKind,
    pub reason: String,
}

/// Executor talking to remote nodes over HTTP
pub struct HttpExecutor {
    client: reqwest::Client,
    addresses: HashMap<NodeId, String>,
}

impl HttpExecutor {
    pub fn new(endpoints: &[NodeEndpoint], connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        let addresses = endpoints
            .iter()
            .map(|e| (e.id.clone(), e.address.trim_end_matches('/').to_string()))
            .collect();
        Ok(Self { client, addresses })
    }

    fn url(&self, node: &NodeId) -> Result<String> {
        let address = self
            .addresses
            .get(node)
            .ok_or_else(|| crate::Error::CopyUnreachable {
                node: node.to_string(),
                reason: "no address configured".into(),
            })?;
        Ok(format!("{}/_internal/apply", address))
    }
}

#[async_trait]
impl CopyExecutor for HttpExecutor {
    async fn apply(&self, copy: &ShardCopy, request: &ShardRequest) -> Result<WriteLocation> {
        let url = self.url(&copy.node)?;
        let envelope = ApplyEnvelope {
            copy: copy.clone(),
            request: request.clone(),
        };

        let response = self
            .client
            .post(&url)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| match crate::Error::from(e) {
                crate::Error::ConnectionFailed(reason) => crate::Error::CopyUnreachable {
                    node: copy.node.to_string(),
                    reason,
                },
                other => other,
            })?;

        if response.status().is_success() {
            return Ok(response.json::<WriteLocation>().await?);
        }

        let status = response.status();
        match response.json::<RemoteError>().await {
            Ok(remote) => Err(crate::Error::from_remote(
                remote.kind,
                copy.node.as_str(),
                remote.reason,
            )),
            Err(_) => Err(crate::Error::Http(format!(
                "node {} answered {}",
                copy.node, status
            ))),
        }
    }
}
