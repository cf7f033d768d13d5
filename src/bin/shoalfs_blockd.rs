//! ShoalFS block shard daemon
//!
//! Hosts one content-addressed block store on a TCP endpoint. All state is
//! in-memory; a restart starts empty.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use shoalfs::logging;
use shoalfs::rpc::server;
use shoalfs::storage::BlockStore;

#[derive(Debug, Parser)]
#[command(name = "shoalfs_blockd", about = "ShoalFS block shard daemon")]
struct Args {
    /// Address to listen on (host:port)
    #[arg(long, default_value = "127.0.0.1:5001")]
    listen: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logging::init(&args.log_level);

    let listener = tokio::net::TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen))?;

    tracing::info!("Block shard listening on {}", args.listen);

    let store = Arc::new(BlockStore::new());
    server::serve_shard(listener, store).await?;

    Ok(())
}
