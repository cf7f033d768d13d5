use sha2::{Digest, Sha256};

use crate::metadata::{BlockHash, BLOCK_SIZE};

/// ブロックのコンテンツハッシュを計算 (SHA-256, 小文字hex)
///
/// 同一バイト列は常に同一ハッシュになり、重複排除とシャード配置の両方の
/// キーとして使われる。
pub fn block_hash(data: &[u8]) -> BlockHash {
    hex::encode(Sha256::digest(data))
}

/// チャンク分割されたブロック
///
/// 生データとそのコンテンツハッシュの組。ハッシュリストと同じ並び順で
/// 保持され、欠損ブロック修復時にインデックス対応で元データを引ける。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// コンテンツハッシュ
    pub hash: BlockHash,

    /// ブロックのバイト列
    pub data: Vec<u8>,
}

/// チャンカー
///
/// ファイルのバイト列を固定長ブロックに分割する。最終ブロックだけ短く
/// なりうる。長さ0の入力はブロックを生成しない。
pub struct Chunker {
    /// ブロックサイズ (バイト)
    block_size: usize,
}

impl Chunker {
    /// 新しいチャンカーを作成 (デフォルトブロックサイズ)
    pub fn new() -> Self {
        Self::with_block_size(BLOCK_SIZE)
    }

    /// 指定されたブロックサイズでチャンカーを作成
    pub fn with_block_size(block_size: usize) -> Self {
        Self { block_size }
    }

    /// ブロックサイズを取得
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// ファイルサイズからブロック数を計算
    pub fn block_count(&self, file_size: u64) -> u64 {
        if file_size == 0 {
            0
        } else {
            (file_size + self.block_size as u64 - 1) / self.block_size as u64
        }
    }

    /// バイト列をブロック列に分割し、各ブロックをハッシュする
    ///
    /// 読み出し順 = 返り値の順序がハッシュリストの連結順序を定義する。
    pub fn split(&self, data: &[u8]) -> Vec<Block> {
        data.chunks(self.block_size)
            .map(|chunk| Block {
                hash: block_hash(chunk),
                data: chunk.to_vec(),
            })
            .collect()
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_hash_stability() {
        let data = b"the same bytes";
        assert_eq!(block_hash(data), block_hash(data));

        // SHA-256 の空入力ダイジェスト (既知値)
        assert_eq!(
            block_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_block_hash_is_lowercase_hex() {
        let hash = block_hash(b"abc");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_block_count() {
        let chunker = Chunker::new();

        assert_eq!(chunker.block_count(0), 0);
        assert_eq!(chunker.block_count(1), 1);
        assert_eq!(chunker.block_count(BLOCK_SIZE as u64 - 1), 1);
        assert_eq!(chunker.block_count(BLOCK_SIZE as u64), 1);
        assert_eq!(chunker.block_count(BLOCK_SIZE as u64 + 1), 2);
        assert_eq!(chunker.block_count(10 * BLOCK_SIZE as u64), 10);
    }

    #[test]
    fn test_split_empty_input() {
        let chunker = Chunker::new();

        // 長さ0の入力は空のブロック列
        assert!(chunker.split(&[]).is_empty());
    }

    #[test]
    fn test_split_partial_block() {
        let chunker = Chunker::new();

        let data = vec![0xAB; 100];
        let blocks = chunker.split(&data);

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].data, data);
        assert_eq!(blocks[0].hash, block_hash(&data));
    }

    #[test]
    fn test_split_exact_block() {
        let chunker = Chunker::new();

        let data = vec![0xCD; BLOCK_SIZE];
        let blocks = chunker.split(&data);

        // ちょうど1ブロック (余分な空ブロックは生成しない)
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].data.len(), BLOCK_SIZE);
    }

    #[test]
    fn test_split_multiple_blocks() {
        let chunker = Chunker::new();

        let data: Vec<u8> = (0..10000).map(|i| (i % 251) as u8).collect();
        let blocks = chunker.split(&data);

        // 10000 = 4096 + 4096 + 1808
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].data.len(), BLOCK_SIZE);
        assert_eq!(blocks[1].data.len(), BLOCK_SIZE);
        assert_eq!(blocks[2].data.len(), 1808);

        // 連結すると元のバイト列に戻る
        let joined: Vec<u8> = blocks.iter().flat_map(|b| b.data.clone()).collect();
        assert_eq!(joined, data);
    }

    #[test]
    fn test_split_identical_blocks_share_hash() {
        let chunker = Chunker::new();

        // 同一内容の2ブロック
        let data = vec![0x5A; 2 * BLOCK_SIZE];
        let blocks = chunker.split(&data);

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].hash, blocks[1].hash);
    }

    #[test]
    fn test_custom_block_size() {
        let chunker = Chunker::with_block_size(10);
        assert_eq!(chunker.block_size(), 10);

        let blocks = chunker.split(&[0u8; 25]);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[2].data.len(), 5);
    }
}
