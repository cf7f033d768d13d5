//! Dialing implementations of the service traits
//!
//! [`ShardClient`] and [`MetadataClient`] speak the framed MessagePack
//! protocol over a TCP connection and implement the same [`ShardRpc`] /
//! [`MetadataRpc`] traits as the in-process services, so the rest of the
//! system cannot tell a remote endpoint from a local one.

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::metadata::{BlockRef, FileInfo};
use crate::rpc::protocol::{self, Request, Response};
use crate::rpc::{MetadataRpc, RpcError, RpcResult, ShardRpc};

/// One framed request/response connection
///
/// A single request is in flight at a time; concurrent callers serialize on
/// the stream lock, which preserves the synchronous call semantics the
/// protocol assumes.
pub struct RpcChannel {
    stream: Mutex<TcpStream>,
    addr: String,
}

impl RpcChannel {
    /// Connect to a service endpoint
    pub async fn connect(addr: &str) -> RpcResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        tracing::debug!("Connected to {}", addr);

        Ok(Self {
            stream: Mutex::new(stream),
            addr: addr.to_string(),
        })
    }

    /// Endpoint address this channel is connected to
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send one request and wait for its response
    async fn call(&self, request: &Request) -> RpcResult<Response> {
        let mut stream = self.stream.lock().await;

        tracing::trace!("Calling {} on {}", request.op_name(), self.addr);
        protocol::write_frame(&mut *stream, request).await?;
        protocol::read_frame(&mut *stream).await
    }
}

fn unexpected(response: Response) -> RpcError {
    RpcError::Protocol(format!("unexpected response: {:?}", response))
}

fn expect_ok(response: Response) -> RpcResult<()> {
    match response {
        Response::Ok => Ok(()),
        Response::Error { error } => Err(error.into()),
        other => Err(unexpected(other)),
    }
}

fn expect_bool(response: Response) -> RpcResult<bool> {
    match response {
        Response::Bool { value } => Ok(value),
        Response::Error { error } => Err(error.into()),
        other => Err(unexpected(other)),
    }
}

/// Client for one block shard
pub struct ShardClient {
    channel: RpcChannel,
}

impl ShardClient {
    /// Connect to a block shard endpoint
    pub async fn connect(addr: &str) -> RpcResult<Self> {
        Ok(Self {
            channel: RpcChannel::connect(addr).await?,
        })
    }
}

#[async_trait]
impl ShardRpc for ShardClient {
    async fn store_block(&self, hash: &str, data: Vec<u8>) -> RpcResult<()> {
        let request = Request::StoreBlock {
            hash: hash.to_string(),
            data,
        };
        expect_ok(self.channel.call(&request).await?)
    }

    async fn get_block(&self, hash: &str) -> RpcResult<Vec<u8>> {
        let request = Request::GetBlock {
            hash: hash.to_string(),
        };
        match self.channel.call(&request).await? {
            Response::Block { data } => Ok(data),
            Response::Error { error } => Err(error.into()),
            other => Err(unexpected(other)),
        }
    }

    async fn has_block(&self, hash: &str) -> RpcResult<bool> {
        let request = Request::HasBlock {
            hash: hash.to_string(),
        };
        expect_bool(self.channel.call(&request).await?)
    }

    async fn ping(&self) -> RpcResult<bool> {
        expect_bool(self.channel.call(&Request::Ping).await?)
    }
}

/// Client for the metadata authority
pub struct MetadataClient {
    channel: RpcChannel,
}

impl MetadataClient {
    /// Connect to the metadata authority endpoint
    pub async fn connect(addr: &str) -> RpcResult<Self> {
        Ok(Self {
            channel: RpcChannel::connect(addr).await?,
        })
    }
}

#[async_trait]
impl MetadataRpc for MetadataClient {
    async fn read_file(&self, filename: &str) -> RpcResult<FileInfo> {
        let request = Request::ReadFile {
            filename: filename.to_string(),
        };
        match self.channel.call(&request).await? {
            Response::File { info } => Ok(info),
            Response::Error { error } => Err(error.into()),
            other => Err(unexpected(other)),
        }
    }

    async fn modify_file(
        &self,
        filename: &str,
        version: u64,
        hashlist: Vec<BlockRef>,
    ) -> RpcResult<()> {
        let request = Request::ModifyFile {
            filename: filename.to_string(),
            version,
            hashlist,
        };
        expect_ok(self.channel.call(&request).await?)
    }

    async fn delete_file(&self, filename: &str, version: u64) -> RpcResult<()> {
        let request = Request::DeleteFile {
            filename: filename.to_string(),
            version,
        };
        expect_ok(self.channel.call(&request).await?)
    }
}
