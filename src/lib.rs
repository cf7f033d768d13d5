//! ShoalFS - A Distributed File Synchronization Store
//!
//! ShoalFS is a simplified distributed file-synchronization store. Clients
//! upload, download, and delete whole files; file content is split into
//! content-addressed 4KB blocks spread across independent block shards, while
//! a single metadata authority tracks a version-fenced record per filename.
//! It features:
//!
//! - **Content-Addressed Blocks**: Every block is keyed by the SHA-256 hex
//!   digest of its bytes, so identical content deduplicates for free
//! - **Version Fencing**: The metadata authority accepts a mutation only at
//!   exactly current+1, giving optimistic concurrency control without locks
//!   spanning the cluster
//! - **Fail-Closed Commits**: A hashlist is committed only after every
//!   referenced block is verified present on its assigned shard
//! - **Pluggable Placement**: Blocks are routed to shards either by digest
//!   modulo the shard count or by live latency probing
//!
//! # Architecture
//!
//! ShoalFS consists of several key components:
//!
//! - **Metadata Authority** ([`metadata`]): Per-filename version + hashlist
//!   records with per-filename critical sections and shard validation
//! - **Block Shards** ([`storage`]): Flat concurrent hash-to-bytes stores,
//!   one per shard endpoint
//! - **Client** ([`api`]): Chunks files, places blocks, and drives the
//!   upload/download/delete reconciliation loops
//! - **Data Layer** ([`data`]): Chunking, hashing, and placement strategies
//! - **RPC Layer** ([`rpc`]): Transport-agnostic service traits plus a
//!   framed MessagePack-over-TCP client and server
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use shoalfs::api::ShoalClient;
//! use shoalfs::metadata::MetadataManager;
//! use shoalfs::storage::BlockStore;
//! use shoalfs::rpc::ShardRpc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // In-process cluster: two shards and the authority
//! let shards: Vec<Arc<dyn ShardRpc>> = vec![
//!     Arc::new(BlockStore::new()),
//!     Arc::new(BlockStore::new()),
//! ];
//! let authority = Arc::new(MetadataManager::new(shards.clone()));
//!
//! let client = ShoalClient::new(authority, shards);
//! client.upload_bytes("notes.txt", b"hello shoal").await?;
//! let data = client.download_bytes("notes.txt").await?;
//! assert_eq!(data, b"hello shoal");
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod data;
pub mod logging;
pub mod metadata;
pub mod rpc;
pub mod storage;
