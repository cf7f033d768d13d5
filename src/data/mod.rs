// データ管理モジュール
pub mod chunking;
pub mod placement;

pub use chunking::{block_hash, Block, Chunker};
pub use placement::{DeterministicPlacement, LatencyProbePlacement, PlacementStrategy};
