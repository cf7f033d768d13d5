//! RPC layer for ShoalFS
//!
//! The protocol logic is transport-agnostic: the metadata authority and the
//! client talk to shards (and the client to the authority) exclusively
//! through the [`ShardRpc`] and [`MetadataRpc`] traits. The in-process
//! service structs implement the traits directly, and [`client`] provides
//! implementations that dial a remote service over framed MessagePack on
//! TCP, served by [`server`].
//!
//! Calls are synchronous request/response from the caller's viewpoint. The
//! domain failure values (VersionMismatch, MissingBlocks, FileNotFound,
//! block NotFound) survive the seam as distinguishable [`RpcError`]
//! variants, which is what the client's reconciliation loop dispatches on.

use async_trait::async_trait;

use crate::metadata::{BlockRef, FileInfo, MetadataError};
use crate::storage::BlockStoreError;

pub mod client;
pub mod protocol;
pub mod server;

pub use client::{MetadataClient, ShardClient};
pub use protocol::{Request, Response, WireError};

/// RPC error types
///
/// Domain errors are embedded so callers can match on them after a remote
/// round trip exactly as they would on an in-process call.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Block(#[from] BlockStoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("protocol error: {0}")]
    Protocol(String),
}

pub type RpcResult<T> = Result<T, RpcError>;

/// Block shard service surface
///
/// A shard is a flat content-addressed map from block hash to bytes. It has
/// no knowledge of files or versions.
#[async_trait]
pub trait ShardRpc: Send + Sync {
    /// Store a block under its content hash. Idempotent: repeated stores of
    /// the same hash are interchangeable.
    async fn store_block(&self, hash: &str, data: Vec<u8>) -> RpcResult<()>;

    /// Fetch a block by hash. Fails with a NotFound error if absent.
    async fn get_block(&self, hash: &str) -> RpcResult<Vec<u8>>;

    /// Check whether a block exists. Used by the authority for commit
    /// validation.
    async fn has_block(&self, hash: &str) -> RpcResult<bool>;

    /// Liveness probe with no side effects; callers time the round trip.
    async fn ping(&self) -> RpcResult<bool>;
}

/// Metadata authority service surface
#[async_trait]
pub trait MetadataRpc: Send + Sync {
    /// Read the current version and hashlist for a filename.
    async fn read_file(&self, filename: &str) -> RpcResult<FileInfo>;

    /// Propose a new hashlist at exactly current+1. Fails with
    /// VersionMismatch or MissingBlocks without mutating.
    async fn modify_file(
        &self,
        filename: &str,
        version: u64,
        hashlist: Vec<BlockRef>,
    ) -> RpcResult<()>;

    /// Tombstone a file at exactly current+1. Fails with FileNotFound if the
    /// file was never created.
    async fn delete_file(&self, filename: &str, version: u64) -> RpcResult<()>;
}
