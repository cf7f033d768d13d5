use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::instrument;

use crate::rpc::{RpcResult, ShardRpc};

/// Block storage error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockStoreError {
    #[error("Block not found: {0}")]
    NotFound(String),
}

pub type BlockStoreResult<T> = Result<T, BlockStoreError>;

/// In-memory content-addressed block store
///
/// One instance backs one shard. Blocks are keyed by the SHA-256 hex digest
/// of their bytes, so a store of already-present content is a no-op in
/// effect: assuming no hash collisions, the incoming bytes equal the stored
/// ones. State lives only in process memory for the service lifetime.
pub struct BlockStore {
    /// Block data storage (hash -> bytes)
    blocks: RwLock<HashMap<String, Vec<u8>>>,
}

impl BlockStore {
    /// Create a new empty block store
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(HashMap::new()),
        }
    }

    /// Store a block under its hash
    ///
    /// Idempotent insert: concurrent or repeated stores of the same hash are
    /// interchangeable. Never fails.
    #[instrument(level = "trace", name = "block_store", skip(self, data), fields(hash, len = data.len()))]
    pub fn store(&self, hash: &str, data: Vec<u8>) {
        let mut blocks = self.blocks.write().expect("block map poisoned");
        let replaced = blocks.insert(hash.to_string(), data).is_some();

        tracing::debug!("Stored block {} (replaced={})", hash, replaced);
    }

    /// Fetch a block by hash
    #[instrument(level = "trace", name = "block_get", skip(self), fields(hash))]
    pub fn get(&self, hash: &str) -> BlockStoreResult<Vec<u8>> {
        self.blocks
            .read()
            .expect("block map poisoned")
            .get(hash)
            .cloned()
            .ok_or_else(|| BlockStoreError::NotFound(hash.to_string()))
    }

    /// Check whether a block exists
    pub fn has(&self, hash: &str) -> bool {
        self.blocks
            .read()
            .expect("block map poisoned")
            .contains_key(hash)
    }

    /// Get the number of distinct stored blocks
    pub fn block_count(&self) -> usize {
        self.blocks.read().expect("block map poisoned").len()
    }

    /// Get the total stored size in bytes
    pub fn storage_size(&self) -> usize {
        self.blocks
            .read()
            .expect("block map poisoned")
            .values()
            .map(|data| data.len())
            .sum()
    }

    /// Clear all blocks
    pub fn clear(&self) {
        self.blocks.write().expect("block map poisoned").clear();
        tracing::debug!("Cleared all blocks");
    }
}

impl Default for BlockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShardRpc for BlockStore {
    async fn store_block(&self, hash: &str, data: Vec<u8>) -> RpcResult<()> {
        self.store(hash, data);
        Ok(())
    }

    async fn get_block(&self, hash: &str) -> RpcResult<Vec<u8>> {
        Ok(self.get(hash)?)
    }

    async fn has_block(&self, hash: &str) -> RpcResult<bool> {
        Ok(self.has(hash))
    }

    async fn ping(&self) -> RpcResult<bool> {
        Ok(true)
    }
}
