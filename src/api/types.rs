/// API types for ShoalFS client operations
use crate::rpc::RpcError;

/// API errors
///
/// `NotFound` is the only protocol outcome the client surfaces without
/// retry; version races and missing blocks are repaired inside the
/// reconciliation loop and never reach the caller.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

pub type ApiResult<T> = Result<T, ApiError>;
