/// Synchronization operations for ShoalFS
///
/// This module provides the client entry point. It chunks and hashes local
/// content, places every block on a shard, and drives the upload, download,
/// and delete protocols against the metadata authority, transparently
/// repairing missing-block and version-race failures.
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::instrument;

use crate::api::types::{ApiError, ApiResult};
use crate::data::{Block, Chunker, DeterministicPlacement, PlacementStrategy};
use crate::metadata::{BlockHash, BlockRef, MetadataError};
use crate::rpc::{MetadataRpc, RpcError, ShardRpc};

/// ShoalFS client
///
/// Holds connections to the metadata authority and every block shard
/// (indexed by shard index). The same instance can be shared by concurrent
/// tasks; every operation is self-contained.
pub struct ShoalClient {
    /// Metadata authority connection
    metadata: Arc<dyn MetadataRpc>,

    /// Shard connections (index = shard index)
    shards: Vec<Arc<dyn ShardRpc>>,

    /// Placement strategy
    placement: Arc<dyn PlacementStrategy>,

    /// Chunker
    chunker: Chunker,
}

impl ShoalClient {
    /// Create a new client with deterministic placement
    pub fn new(metadata: Arc<dyn MetadataRpc>, shards: Vec<Arc<dyn ShardRpc>>) -> Self {
        let placement = Arc::new(DeterministicPlacement::new(shards.len()));
        Self::with_placement(metadata, shards, placement)
    }

    /// Create a new client with an explicit placement strategy
    pub fn with_placement(
        metadata: Arc<dyn MetadataRpc>,
        shards: Vec<Arc<dyn ShardRpc>>,
        placement: Arc<dyn PlacementStrategy>,
    ) -> Self {
        Self {
            metadata,
            shards,
            placement,
            chunker: Chunker::new(),
        }
    }

    /// Override the block size (default: 4KB)
    ///
    /// All participants of a deployment must agree on the block size, or
    /// identical content stops deduplicating across them.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.chunker = Chunker::with_block_size(block_size);
        self
    }

    /// Number of shards this client talks to
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Upload a local file
    ///
    /// The stored filename is the final path component. Returns the committed
    /// version.
    pub async fn upload(&self, path: &Path) -> ApiResult<u64> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ApiError::InvalidPath(format!("{:?}", path)))?;

        let data = tokio::fs::read(path).await?;
        self.upload_bytes(filename, &data).await
    }

    /// Upload file content under the given filename
    ///
    /// The hashlist and placement are computed once from `data` and retried
    /// unchanged through version races, so whichever attempt commits stores
    /// exactly this snapshot. The loop runs until the commit succeeds; only
    /// transport failures surface as errors.
    #[instrument(level = "debug", name = "shoal_upload", skip(self, data), fields(filename, len = data.len()))]
    pub async fn upload_bytes(&self, filename: &str, data: &[u8]) -> ApiResult<u64> {
        let blocks = self.chunker.split(data);

        let mut hashlist = Vec::with_capacity(blocks.len());
        for block in &blocks {
            let shard = self.placement.place_block(&block.hash).await?;
            hashlist.push(BlockRef::new(block.hash.clone(), shard));
        }

        let info = self.metadata.read_file(filename).await?;
        let mut target = info.version + 1;

        loop {
            match self
                .metadata
                .modify_file(filename, target, hashlist.clone())
                .await
            {
                Ok(()) => {
                    tracing::info!("Uploaded {} at version {}", filename, target);
                    return Ok(target);
                }
                Err(RpcError::Metadata(MetadataError::MissingBlocks { hashes })) => {
                    tracing::debug!(
                        "Pushing {} missing block(s) for {} and retrying at version {}",
                        hashes.len(),
                        filename,
                        target
                    );
                    self.push_missing(&hashes, &hashlist, &blocks).await?;
                    // Same target: the fence was not the problem
                }
                Err(RpcError::Metadata(MetadataError::VersionMismatch { current })) => {
                    tracing::debug!(
                        "Version race on {} (current {}), retrying at {}",
                        filename,
                        current,
                        current + 1
                    );
                    target = current + 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Store the reported missing blocks on their assigned shards
    ///
    /// Each missing hash is resolved back to its raw bytes by index
    /// correlation between the hashlist and the chunked blocks.
    async fn push_missing(
        &self,
        missing: &BTreeSet<BlockHash>,
        hashlist: &[BlockRef],
        blocks: &[Block],
    ) -> ApiResult<()> {
        for hash in missing {
            let index = hashlist
                .iter()
                .position(|entry| &entry.hash == hash)
                .ok_or_else(|| {
                    RpcError::Protocol(format!("authority reported foreign missing hash {}", hash))
                })?;

            let shard = self.shards.get(hashlist[index].shard).ok_or_else(|| {
                RpcError::Protocol(format!(
                    "shard index {} out of range (shard count {})",
                    hashlist[index].shard,
                    self.shards.len()
                ))
            })?;
            shard
                .store_block(hash, blocks[index].data.clone())
                .await?;
        }

        Ok(())
    }

    /// Download a file into the given directory
    ///
    /// The destination file is written as a single unit after the full
    /// content has been assembled.
    pub async fn download(&self, filename: &str, dest_dir: &Path) -> ApiResult<PathBuf> {
        let data = self.download_bytes(filename).await?;

        let dest = dest_dir.join(filename);
        tokio::fs::write(&dest, &data).await?;

        Ok(dest)
    }

    /// Fetch and reassemble file content
    ///
    /// Blocks are fetched from their designated shards and concatenated in
    /// hashlist order. A block already fetched for the same hash within this
    /// call is reused; different content is never substituted for a required
    /// hash.
    #[instrument(level = "debug", name = "shoal_download", skip(self), fields(filename))]
    pub async fn download_bytes(&self, filename: &str) -> ApiResult<Vec<u8>> {
        let info = self.metadata.read_file(filename).await?;

        let hashlist = match info.hashlist {
            Some(hashlist) if info.version > 0 => hashlist,
            // Never created or tombstoned
            _ => return Err(ApiError::NotFound(filename.to_string())),
        };

        let mut fetched: HashMap<BlockHash, Vec<u8>> = HashMap::new();
        let mut contents = Vec::new();

        for entry in &hashlist {
            let shard = self.shards.get(entry.shard).ok_or_else(|| {
                RpcError::Protocol(format!(
                    "shard index {} out of range (shard count {})",
                    entry.shard,
                    self.shards.len()
                ))
            })?;

            if let Some(data) = fetched.get(&entry.hash) {
                contents.extend_from_slice(data);
                continue;
            }

            let data = shard.get_block(&entry.hash).await?;
            contents.extend_from_slice(&data);
            fetched.insert(entry.hash.clone(), data);
        }

        tracing::info!("Downloaded {} ({} bytes)", filename, contents.len());

        Ok(contents)
    }

    /// Delete a file
    ///
    /// Retries through version races; reports NotFound for files that never
    /// existed. Returns the tombstone version.
    #[instrument(level = "debug", name = "shoal_delete", skip(self), fields(filename))]
    pub async fn delete(&self, filename: &str) -> ApiResult<u64> {
        let info = self.metadata.read_file(filename).await?;
        if info.version == 0 {
            return Err(ApiError::NotFound(filename.to_string()));
        }

        let mut target = info.version + 1;

        loop {
            match self.metadata.delete_file(filename, target).await {
                Ok(()) => {
                    tracing::info!("Deleted {} at version {}", filename, target);
                    return Ok(target);
                }
                Err(RpcError::Metadata(MetadataError::VersionMismatch { current })) => {
                    target = current + 1;
                }
                Err(RpcError::Metadata(MetadataError::FileNotFound(_))) => {
                    // No retry: the race was lost to a writer that never existed
                    return Err(ApiError::NotFound(filename.to_string()));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
