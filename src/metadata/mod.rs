// メタデータ管理モジュール
pub mod manager;
pub mod types;

pub use manager::{MetadataManager, MetadataError, MetadataResult};
pub use types::{BlockHash, BlockRef, FileInfo, FileRecord, ShardIndex};

// ブロックサイズ: 4KB
// Files are split into fixed 4096-byte blocks; the final block may be
// shorter. The block hash (SHA-256 hex) doubles as the placement key.
pub const BLOCK_SIZE: usize = 4096;
