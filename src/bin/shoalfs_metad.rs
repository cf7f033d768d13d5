//! ShoalFS metadata authority daemon
//!
//! Hosts the single metadata authority. On startup it dials every shard
//! endpoint from the cluster config; those connections back the fail-closed
//! block validation performed on each modify.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use shoalfs::config::ClusterConfig;
use shoalfs::logging;
use shoalfs::metadata::MetadataManager;
use shoalfs::rpc::{server, ShardClient, ShardRpc};

#[derive(Debug, Parser)]
#[command(name = "shoalfs_metad", about = "ShoalFS metadata authority daemon")]
struct Args {
    /// Cluster config file
    #[arg(long, default_value = "shoal.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = ClusterConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;

    logging::init(&config.log_level);

    tracing::info!("Starting ShoalFS metadata authority");
    tracing::info!("Shard count: {}", config.shard_count());

    let mut shards: Vec<Arc<dyn ShardRpc>> = Vec::with_capacity(config.shard_count());
    for (index, addr) in config.shards.iter().enumerate() {
        let client = ShardClient::connect(addr)
            .await
            .with_context(|| format!("Failed to connect to shard {} at {}", index, addr))?;
        shards.push(Arc::new(client));
    }

    let listener = tokio::net::TcpListener::bind(&config.metadata_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.metadata_addr))?;

    tracing::info!("Metadata authority listening on {}", config.metadata_addr);

    let manager = Arc::new(MetadataManager::new(shards));
    server::serve_metadata(listener, manager).await?;

    Ok(())
}
