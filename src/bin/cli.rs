//! CLI for document and collection operations

use clap::{Parser, Subcommand};
use minidoc::common::{ConsistencyLevel, VersionType};
use minidoc::ops::{
    create_collection, delete_document, index_document, rebuild_collection, WriteOptions,
    WriteReport,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "minidoc")]
#[command(about = "minidoc replicated document store CLI")]
#[command(version)]
struct Cli {
    /// Coordinator URL
    #[arg(long, default_value = "http://localhost:5000")]
    coordinator: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct WriteArgs {
    /// Routing value (replaces the id as shard key)
    #[arg(long)]
    routing: Option<String>,

    /// Consistency level (one, quorum, all)
    #[arg(long)]
    consistency: Option<ConsistencyLevel>,

    /// Timeout, e.g. 500ms or 30s
    #[arg(long)]
    timeout: Option<String>,

    /// Expected or external version
    #[arg(long)]
    version: Option<u64>,

    /// Version type (internal, external, external_gte)
    #[arg(long)]
    version_type: Option<VersionType>,
}

impl From<WriteArgs> for WriteOptions {
    fn from(args: WriteArgs) -> Self {
        WriteOptions {
            routing: args.routing,
            consistency: args.consistency,
            timeout: args.timeout,
            version: args.version,
            version_type: args.version_type,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a collection
    Create {
        collection: String,

        #[arg(long)]
        partitions: Option<u32>,

        #[arg(long)]
        replicas: Option<usize>,

        /// Require a routing value on every single-key operation
        #[arg(long)]
        routing_required: bool,
    },

    /// Index a JSON document
    Index {
        collection: String,
        id: String,

        /// Inline JSON source
        #[arg(long, conflicts_with = "file")]
        source: Option<String>,

        /// File containing the JSON source
        #[arg(long)]
        file: Option<PathBuf>,

        #[command(flatten)]
        write: WriteArgs,
    },

    /// Delete a document
    Delete {
        collection: String,
        id: String,

        #[command(flatten)]
        write: WriteArgs,
    },

    /// Rebuild every partition of a collection
    Rebuild {
        collection: String,

        /// Overall timeout, e.g. 30s
        #[arg(long)]
        timeout: Option<String>,
    },
}

fn print_write(action: &str, report: &WriteReport) {
    println!("{} {}/{}:", action, report.collection, report.id);
    println!("  Result: {}", report.result);
    println!("  Version: {}", report.version);
    println!("  Seq no: {}", report.seq_no);
    println!("  Primary: {} (shard {})", report.primary, report.shard);
    println!(
        "  Copies: {}/{} acknowledged, {} failed",
        report.shards.successful, report.shards.total, report.shards.failed
    );
    for failure in &report.shards.failures {
        println!(
            "    {} {}: {}",
            failure.node.as_ref().map(|n| n.as_str()).unwrap_or("-"),
            failure.kind,
            failure.reason
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Create {
            collection,
            partitions,
            replicas,
            routing_required,
        } => {
            let report = create_collection(
                &cli.coordinator,
                &collection,
                partitions,
                replicas,
                routing_required,
            )
            .await?;
            println!("Created collection {}:", report.collection);
            println!("  Partitions: {}", report.partitions);
            println!("  Replicas: {}", report.replicas);
            println!("  Routing required: {}", report.routing_required);
        }

        Commands::Index {
            collection,
            id,
            source,
            file,
            write,
        } => {
            let text = match (source, file) {
                (Some(source), _) => source,
                (None, Some(file)) => tokio::fs::read_to_string(&file).await?,
                (None, None) => anyhow::bail!("either --source or --file is required"),
            };
            let source: serde_json::Value = serde_json::from_str(&text)?;
            let report =
                index_document(&cli.coordinator, &collection, &id, &source, &write.into()).await?;
            print_write("Indexed", &report);
        }

        Commands::Delete {
            collection,
            id,
            write,
        } => {
            let report = delete_document(&cli.coordinator, &collection, &id, &write.into()).await?;
            print_write("Deleted", &report);
        }

        Commands::Rebuild {
            collection,
            timeout,
        } => {
            let result = rebuild_collection(&cli.coordinator, &collection, timeout.as_deref()).await?;
            println!("Rebuild report for {}:", collection);
            println!("  Partitions: {}", result.total);
            println!("  Successful: {}", result.successful);
            println!("  Failed: {}", result.failed);
            for failure in &result.failures {
                println!(
                    "    {} {}: {}",
                    failure.partition, failure.kind, failure.reason
                );
            }
        }
    }

    Ok(())
}
