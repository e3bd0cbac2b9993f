//! Node binary

use anyhow::Result;
use clap::Parser;
use minidoc::common::{Config, NodeId};
use minidoc::node::NodeServer;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "minidoc-node")]
#[command(about = "minidoc node hosting partition copies")]
#[command(version)]
struct Args {
    /// Node ID, as listed in the coordinator's node list
    #[arg(short, long, default_value = "node-1")]
    id: String,

    /// Bind address for the internal copy API
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Configuration file (defaults to ./minidoc.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let log_level = args.log_level.clone().unwrap_or(config.log_level.clone());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut node_config = config.node.unwrap_or_default();
    if let Some(bind) = args.bind {
        node_config.bind_addr = bind;
    }

    NodeServer::new(node_config, NodeId::new(args.id))
        .serve()
        .await?;

    Ok(())
}
