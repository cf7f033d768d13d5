//! Wire protocol for ShoalFS RPC
//!
//! Messages are MessagePack-encoded (`rmp-serde`) and framed with a 4-byte
//! big-endian length prefix. Hashlists travel as structured sequences of
//! (hash, shard) pairs; nothing round-trips through a human-readable string
//! encoding.

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::metadata::{BlockRef, FileInfo, MetadataError};
use crate::rpc::{RpcError, RpcResult};
use crate::storage::BlockStoreError;

/// Maximum frame size (16 MiB)
///
/// Large enough for any store/get payload (blocks are 4 KiB) and for the
/// hashlists of very large files; a guard against corrupt length prefixes.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// RPC request messages
///
/// A single request enum covers both services; each server answers only the
/// requests it serves and rejects the rest with an Internal error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    // Block shard operations
    StoreBlock { hash: String, data: Vec<u8> },
    GetBlock { hash: String },
    HasBlock { hash: String },
    Ping,

    // Metadata authority operations
    ReadFile { filename: String },
    ModifyFile {
        filename: String,
        version: u64,
        hashlist: Vec<BlockRef>,
    },
    DeleteFile { filename: String, version: u64 },
}

impl Request {
    /// Short operation name for logging
    pub fn op_name(&self) -> &'static str {
        match self {
            Request::StoreBlock { .. } => "store_block",
            Request::GetBlock { .. } => "get_block",
            Request::HasBlock { .. } => "has_block",
            Request::Ping => "ping",
            Request::ReadFile { .. } => "read_file",
            Request::ModifyFile { .. } => "modify_file",
            Request::DeleteFile { .. } => "delete_file",
        }
    }
}

/// RPC response messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Ok,
    Block { data: Vec<u8> },
    Bool { value: bool },
    File { info: FileInfo },
    Error { error: WireError },
}

/// Failure values carried over the wire
///
/// The protocol's domain errors stay distinguishable across the transport so
/// the client's retry loop can dispatch on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireError {
    BlockNotFound { hash: String },
    FileNotFound { filename: String },
    VersionMismatch { current: u64 },
    MissingBlocks { hashes: BTreeSet<String> },
    Internal { message: String },
}

impl WireError {
    /// Build the wire representation of a service-side error
    pub fn from_rpc(err: &RpcError) -> Self {
        match err {
            RpcError::Metadata(MetadataError::VersionMismatch { current }) => {
                WireError::VersionMismatch { current: *current }
            }
            RpcError::Metadata(MetadataError::MissingBlocks { hashes }) => {
                WireError::MissingBlocks {
                    hashes: hashes.clone(),
                }
            }
            RpcError::Metadata(MetadataError::FileNotFound(filename)) => WireError::FileNotFound {
                filename: filename.clone(),
            },
            RpcError::Block(BlockStoreError::NotFound(hash)) => {
                WireError::BlockNotFound { hash: hash.clone() }
            }
            other => WireError::Internal {
                message: other.to_string(),
            },
        }
    }
}

impl From<WireError> for RpcError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::BlockNotFound { hash } => BlockStoreError::NotFound(hash).into(),
            WireError::FileNotFound { filename } => MetadataError::FileNotFound(filename).into(),
            WireError::VersionMismatch { current } => {
                MetadataError::VersionMismatch { current }.into()
            }
            WireError::MissingBlocks { hashes } => MetadataError::MissingBlocks { hashes }.into(),
            WireError::Internal { message } => RpcError::Protocol(message),
        }
    }
}

/// Write one length-prefixed MessagePack frame
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> RpcResult<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = rmp_serde::to_vec(message)?;
    if body.len() > MAX_FRAME_SIZE {
        return Err(RpcError::FrameTooLarge {
            size: body.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    writer.write_all(&(body.len() as u32).to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;

    Ok(())
}

/// Read one length-prefixed MessagePack frame
pub async fn read_frame<R, T>(reader: &mut R) -> RpcResult<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(RpcError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;

    Ok(rmp_serde::from_slice(&body)?)
}
