//! TCP servers for block shards and the metadata authority
//!
//! Each accepted connection is served by its own task; requests on one
//! connection are handled strictly in order (synchronous request/response).
//! Service errors never tear down the connection; they travel back as
//! [`WireError`] values and the loop keeps reading.

use std::io::ErrorKind;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};

use crate::rpc::protocol::{self, Request, Response, WireError};
use crate::rpc::{MetadataRpc, RpcError, RpcResult, ShardRpc};

/// Serve a block shard on the given listener. Runs until the listener fails.
pub async fn serve_shard(listener: TcpListener, service: Arc<dyn ShardRpc>) -> std::io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        tracing::debug!("Accepted shard connection from {}", peer);

        let service = Arc::clone(&service);
        tokio::spawn(async move {
            if let Err(e) = serve_connection(stream, move |request| {
                let service = Arc::clone(&service);
                async move { dispatch_shard(service.as_ref(), request).await }
            })
            .await
            {
                tracing::warn!("Shard connection error: {}", e);
            }
        });
    }
}

/// Serve the metadata authority on the given listener.
pub async fn serve_metadata(
    listener: TcpListener,
    service: Arc<dyn MetadataRpc>,
) -> std::io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        tracing::debug!("Accepted metadata connection from {}", peer);

        let service = Arc::clone(&service);
        tokio::spawn(async move {
            if let Err(e) = serve_connection(stream, move |request| {
                let service = Arc::clone(&service);
                async move { dispatch_metadata(service.as_ref(), request).await }
            })
            .await
            {
                tracing::warn!("Metadata connection error: {}", e);
            }
        });
    }
}

/// Request/response loop for one connection
async fn serve_connection<F, Fut>(mut stream: TcpStream, mut dispatch: F) -> RpcResult<()>
where
    F: FnMut(Request) -> Fut,
    Fut: std::future::Future<Output = Response>,
{
    loop {
        let request: Request = match protocol::read_frame(&mut stream).await {
            Ok(request) => request,
            // Peer hung up between requests
            Err(RpcError::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        };

        tracing::trace!("Handling {}", request.op_name());
        let response = dispatch(request).await;
        protocol::write_frame(&mut stream, &response).await?;
    }
}

fn error_response(err: RpcError) -> Response {
    Response::Error {
        error: WireError::from_rpc(&err),
    }
}

async fn dispatch_shard(service: &dyn ShardRpc, request: Request) -> Response {
    match request {
        Request::StoreBlock { hash, data } => match service.store_block(&hash, data).await {
            Ok(()) => Response::Ok,
            Err(e) => error_response(e),
        },
        Request::GetBlock { hash } => match service.get_block(&hash).await {
            Ok(data) => Response::Block { data },
            Err(e) => error_response(e),
        },
        Request::HasBlock { hash } => match service.has_block(&hash).await {
            Ok(value) => Response::Bool { value },
            Err(e) => error_response(e),
        },
        Request::Ping => match service.ping().await {
            Ok(value) => Response::Bool { value },
            Err(e) => error_response(e),
        },
        other => Response::Error {
            error: WireError::Internal {
                message: format!("block shard does not serve {}", other.op_name()),
            },
        },
    }
}

async fn dispatch_metadata(service: &dyn MetadataRpc, request: Request) -> Response {
    match request {
        Request::ReadFile { filename } => match service.read_file(&filename).await {
            Ok(info) => Response::File { info },
            Err(e) => error_response(e),
        },
        Request::ModifyFile {
            filename,
            version,
            hashlist,
        } => match service.modify_file(&filename, version, hashlist).await {
            Ok(()) => Response::Ok,
            Err(e) => error_response(e),
        },
        Request::DeleteFile { filename, version } => {
            match service.delete_file(&filename, version).await {
                Ok(()) => Response::Ok,
                Err(e) => error_response(e),
            }
        }
        other => Response::Error {
            error: WireError::Internal {
                message: format!("metadata authority does not serve {}", other.op_name()),
            },
        },
    }
}
