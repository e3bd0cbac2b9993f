//! Configuration for minidoc components

use crate::common::types::{ConsistencyLevel, NodeId};
use crate::common::Result;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix, e.g. `MINIDOC__COORDINATOR__REPLICAS=2`
const ENV_PREFIX: &str = "MINIDOC";

/// Default configuration file name (without extension)
const DEFAULT_CONFIG_FILE: &str = "minidoc";

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Coordinator-specific config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinator: Option<CoordinatorConfig>,

    /// Node-specific config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeConfig>,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            coordinator: None,
            node: None,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load `minidoc.toml` from the working directory if present, then apply
    /// `MINIDOC__*` environment overrides.
    pub fn load() -> Result<Self> {
        Self::build(config::File::with_name(DEFAULT_CONFIG_FILE).required(false))
    }

    /// Load an explicit configuration file, then apply environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::build(config::File::from(path.as_ref()).required(true))
    }

    fn build<S>(file: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::Error::InvalidConfig(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| crate::Error::InvalidConfig(e.to_string()))
    }
}

/// A cluster member as seen by the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEndpoint {
    pub id: NodeId,
    /// Base URL of the node's internal API, e.g. `http://10.0.0.4:6000`
    pub address: String,
}

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Bind address for HTTP API
    #[serde(default = "default_coord_bind")]
    pub bind_addr: SocketAddr,

    /// RocksDB path for collection metadata (in-memory when unset)
    #[serde(default)]
    pub metadata_path: Option<PathBuf>,

    /// Cluster members hosting copies. Empty means embedded in-process nodes.
    #[serde(default)]
    pub nodes: Vec<NodeEndpoint>,

    /// Number of embedded nodes started when `nodes` is empty
    #[serde(default = "default_embedded_nodes")]
    pub embedded_nodes: usize,

    /// Copies per partition (primary included) for new collections
    #[serde(default = "default_replicas")]
    pub replicas: usize,

    /// Partitions for auto-created collections
    #[serde(default = "default_partitions")]
    pub default_partitions: u32,

    /// Level used when a request asks for `default`
    #[serde(default = "default_consistency")]
    pub default_consistency: ConsistencyLevel,

    /// Per-call timeout used when a request carries none
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Auto-create policy: `true`, `false`, or `+pattern,-pattern,...`
    #[serde(default = "default_auto_create")]
    pub auto_create: String,

    /// Maximum request body size
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_coord_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}
fn default_embedded_nodes() -> usize {
    3
}
fn default_replicas() -> usize {
    3
}
fn default_partitions() -> u32 {
    5
}
fn default_consistency() -> ConsistencyLevel {
    ConsistencyLevel::Quorum
}
fn default_timeout_ms() -> u64 {
    60_000
}
fn default_auto_create() -> String {
    "true".to_string()
}
fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

impl CoordinatorConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Sanity checks applied before the coordinator starts
    pub fn validate(&self) -> Result<()> {
        if self.replicas == 0 {
            return Err(crate::Error::InvalidConfig("replicas must be >= 1".into()));
        }
        if self.default_partitions == 0 {
            return Err(crate::Error::InvalidConfig(
                "default_partitions must be >= 1".into(),
            ));
        }
        if self.default_timeout_ms == 0 {
            return Err(crate::Error::InvalidConfig(
                "default_timeout_ms must be > 0".into(),
            ));
        }
        if self.nodes.is_empty() && self.embedded_nodes == 0 {
            return Err(crate::Error::InvalidConfig(
                "either nodes or embedded_nodes must be set".into(),
            ));
        }
        Ok(())
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_coord_bind(),
            metadata_path: None,
            nodes: Vec::new(),
            embedded_nodes: default_embedded_nodes(),
            replicas: default_replicas(),
            default_partitions: default_partitions(),
            default_consistency: default_consistency(),
            default_timeout_ms: default_timeout_ms(),
            auto_create: default_auto_create(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Bind address for the internal copy API
    #[serde(default = "default_node_bind")]
    pub bind_addr: SocketAddr,

    /// Maximum request body size
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_node_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 6000))
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_node_bind(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_coordinator_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.replicas, 3);
        assert_eq!(config.default_consistency, ConsistencyLevel::Quorum);
        assert_eq!(config.default_timeout(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_replicas() {
        let config = CoordinatorConfig {
            replicas: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minidoc.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
log_level = "debug"

[coordinator]
replicas = 2
default_consistency = "all"
auto_create = "+logs-*,-*"

[[coordinator.nodes]]
id = "node-1"
address = "http://127.0.0.1:6000"
"#
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.log_level, "debug");
        let coord = config.coordinator.unwrap();
        assert_eq!(coord.replicas, 2);
        assert_eq!(coord.default_consistency, ConsistencyLevel::All);
        assert_eq!(coord.auto_create, "+logs-*,-*");
        assert_eq!(coord.nodes.len(), 1);
        assert_eq!(coord.nodes[0].id, NodeId::new("node-1"));
        assert_eq!(coord.default_partitions, 5);
    }
}
