//! Coordinator binary

use clap::{Parser, Subcommand};
use minidoc::common::{Config, ConsistencyLevel};
use minidoc::CoordinatorServer;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "minidoc-coord")]
#[command(about = "minidoc write and broadcast coordinator")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./minidoc.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start coordinator server
    Serve {
        /// Bind address for HTTP
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Copies per partition for new collections
        #[arg(long)]
        replicas: Option<usize>,

        /// Partitions of auto-created collections
        #[arg(long)]
        partitions: Option<u32>,

        /// Default consistency level (one, quorum, all)
        #[arg(long)]
        consistency: Option<ConsistencyLevel>,

        /// Auto-create policy (true, false, or +pattern,-pattern)
        #[arg(long)]
        auto_create: Option<String>,

        /// Embedded nodes to run when no remote nodes are configured
        #[arg(long)]
        embedded_nodes: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config from file, then override with CLI arguments
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve {
            bind,
            replicas,
            partitions,
            consistency,
            auto_create,
            embedded_nodes,
        } => {
            let mut coord_config = config.coordinator.unwrap_or_default();
            if let Some(bind) = bind {
                coord_config.bind_addr = bind;
            }
            if let Some(replicas) = replicas {
                coord_config.replicas = replicas;
            }
            if let Some(partitions) = partitions {
                coord_config.default_partitions = partitions;
            }
            if let Some(consistency) = consistency {
                coord_config.default_consistency = consistency;
            }
            if let Some(auto_create) = auto_create {
                coord_config.auto_create = auto_create;
            }
            if let Some(embedded_nodes) = embedded_nodes {
                coord_config.embedded_nodes = embedded_nodes;
            }

            CoordinatorServer::new(coord_config).serve().await?;
        }
    }

    Ok(())
}
