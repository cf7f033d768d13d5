//! ShoalFS synchronization client
//!
//! Thin wrapper over the client API: `upload`, `download`, and `delete`.
//! Prints `OK` on success and `Not Found` for files that do not exist,
//! matching the protocol's reporting contract.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use shoalfs::api::{ApiError, ApiResult, ShoalClient};
use shoalfs::config::{ClusterConfig, PlacementMode};
use shoalfs::data::{DeterministicPlacement, LatencyProbePlacement, PlacementStrategy};
use shoalfs::logging;
use shoalfs::rpc::{MetadataClient, ShardClient, ShardRpc};

#[derive(Debug, Parser)]
#[command(name = "shoalfs", about = "ShoalFS synchronization client")]
struct Cli {
    /// Cluster config file
    #[arg(long, default_value = "shoal.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload a local file
    Upload {
        /// Path of the file to upload
        path: PathBuf,
    },

    /// Download a file into a directory
    Download {
        /// Stored filename
        filename: String,

        /// Destination directory
        dest_dir: PathBuf,
    },

    /// Delete a file
    Delete {
        /// Stored filename
        filename: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ClusterConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;

    logging::init(&config.log_level);

    let metadata = Arc::new(
        MetadataClient::connect(&config.metadata_addr)
            .await
            .with_context(|| {
                format!("Failed to connect to metadata authority at {}", config.metadata_addr)
            })?,
    );

    let mut shards: Vec<Arc<dyn ShardRpc>> = Vec::with_capacity(config.shard_count());
    for (index, addr) in config.shards.iter().enumerate() {
        let client = ShardClient::connect(addr)
            .await
            .with_context(|| format!("Failed to connect to shard {} at {}", index, addr))?;
        shards.push(Arc::new(client));
    }

    let placement: Arc<dyn PlacementStrategy> = match config.placement {
        PlacementMode::Deterministic => Arc::new(DeterministicPlacement::new(shards.len())),
        PlacementMode::LatencyProbe => Arc::new(LatencyProbePlacement::new(shards.clone())),
    };

    let client =
        ShoalClient::with_placement(metadata, shards, placement).with_block_size(config.block_size);

    let result = match cli.command {
        Command::Upload { path } => client.upload(&path).await.map(|_| ()),
        Command::Download { filename, dest_dir } => {
            client.download(&filename, &dest_dir).await.map(|_| ())
        }
        Command::Delete { filename } => client.delete(&filename).await.map(|_| ()),
    };

    report(result)
}

/// Print the protocol outcome; only transport and unexpected errors fail the
/// process.
fn report(result: ApiResult<()>) -> anyhow::Result<()> {
    match result {
        Ok(()) => {
            println!("OK");
            Ok(())
        }
        Err(ApiError::NotFound(_)) => {
            println!("Not Found");
            Ok(())
        }
        Err(ApiError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            println!("Not Found");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
