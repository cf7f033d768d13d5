use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::join_all;
use tracing::instrument;

use super::types::{BlockHash, BlockRef, FileInfo, FileRecord};
use crate::rpc::{MetadataRpc, RpcError, RpcResult, ShardRpc};

/// メタデータエラー
///
/// 権限者が返す失敗値。いずれもレコードを部分的に変更した状態では
/// 返らない (all-or-nothing)。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    #[error("Version mismatch: current version is {current}")]
    VersionMismatch { current: u64 },

    #[error("Missing blocks: {} block(s) absent from their shards", .hashes.len())]
    MissingBlocks { hashes: BTreeSet<BlockHash> },

    #[error("File not found: {0}")]
    FileNotFound(String),
}

pub type MetadataResult<T> = Result<T, MetadataError>;

/// メタデータマネージャー (メタデータ権限者)
///
/// filename ごとのバージョンとハッシュリストを保持し、バージョンフェンスと
/// シャード検証を通過した変更だけをコミットする。検証からコミットまでは
/// filename 単位のクリティカルセクションで直列化され、異なる filename の
/// 変更は互いに独立に進行する。
pub struct MetadataManager {
    /// 検証に使うシャード接続 (インデックス順)
    shards: Vec<Arc<dyn ShardRpc>>,

    /// filename -> レコードのレジストリ
    ///
    /// 外側の Mutex はエントリの取得/作成だけを守る短命ロック。レコード
    /// 本体は per-filename の非同期 Mutex が守り、シャード検証の await を
    /// またいで保持される。
    files: Mutex<HashMap<String, Arc<tokio::sync::Mutex<FileRecord>>>>,
}

impl MetadataManager {
    /// 新しいメタデータマネージャーを作成
    ///
    /// # Arguments
    /// * `shards` - シャード接続のリスト (順序 = シャードインデックス)
    pub fn new(shards: Vec<Arc<dyn ShardRpc>>) -> Self {
        Self {
            shards,
            files: Mutex::new(HashMap::new()),
        }
    }

    /// シャード数を取得
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// レジストリに載っている filename の数 (未コミットの予約を含む)
    pub fn tracked_file_count(&self) -> usize {
        self.files.lock().expect("file registry poisoned").len()
    }

    /// filename のレコードを取得または作成
    fn file_entry(&self, filename: &str) -> Arc<tokio::sync::Mutex<FileRecord>> {
        let mut files = self.files.lock().expect("file registry poisoned");
        files
            .entry(filename.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(FileRecord::default())))
            .clone()
    }

    /// filename のレコードを取得 (作成しない)
    fn lookup_entry(&self, filename: &str) -> Option<Arc<tokio::sync::Mutex<FileRecord>>> {
        self.files
            .lock()
            .expect("file registry poisoned")
            .get(filename)
            .cloned()
    }

    /// ハッシュリストの各 (hash, shard) ペアを担当シャードに問い合わせ、
    /// 存在しないハッシュの集合を返す
    ///
    /// 問い合わせはシャードをまたいで同時に実行される。トランスポート
    /// エラーはそのまま伝播する (fail-closed: 確認できないブロックを
    /// 存在扱いにはしない)。
    async fn collect_missing(&self, hashlist: &[BlockRef]) -> RpcResult<BTreeSet<BlockHash>> {
        let checks = hashlist.iter().map(|entry| {
            let shard = Arc::clone(&self.shards[entry.shard]);
            let hash = entry.hash.clone();
            async move {
                let present = shard.has_block(&hash).await?;
                Ok::<_, RpcError>((hash, present))
            }
        });

        let mut missing = BTreeSet::new();
        for result in join_all(checks).await {
            let (hash, present) = result?;
            if !present {
                missing.insert(hash);
            }
        }

        Ok(missing)
    }

    /// ファイルの現在バージョンとハッシュリストを読み出す
    ///
    /// 副作用なし。未作成は (0, None)、tombstone 中は (version, None)。
    #[instrument(level = "trace", name = "metadata_read_file", skip(self), fields(filename))]
    pub async fn read_file(&self, filename: &str) -> RpcResult<FileInfo> {
        let Some(entry) = self.lookup_entry(filename) else {
            return Ok(FileInfo {
                version: 0,
                hashlist: None,
            });
        };

        let record = entry.lock().await;
        Ok(record.snapshot())
    }

    /// ファイルを変更 (作成・更新・再作成)
    ///
    /// version は現在バージョン+1 でなければならない。ハッシュリストが参照
    /// する全ブロックが担当シャード上に存在することを確認してから、
    /// バージョン・ハッシュリスト・tombstone 解除を一括でコミットする。
    #[instrument(level = "trace", name = "metadata_modify_file", skip(self, hashlist), fields(filename, version, blocks = hashlist.len()))]
    pub async fn modify_file(
        &self,
        filename: &str,
        version: u64,
        hashlist: Vec<BlockRef>,
    ) -> RpcResult<()> {
        if let Some(bad) = hashlist.iter().find(|entry| entry.shard >= self.shards.len()) {
            return Err(RpcError::Protocol(format!(
                "shard index {} out of range (shard count {})",
                bad.shard,
                self.shards.len()
            )));
        }

        let entry = self.file_entry(filename);
        let mut record = entry.lock().await;

        if version != record.version + 1 {
            tracing::debug!(
                "Rejected modify of {} at version {} (current {})",
                filename,
                version,
                record.version
            );
            return Err(MetadataError::VersionMismatch {
                current: record.version,
            }
            .into());
        }

        // レコードロックを保持したまま検証する。同一 filename への他の変更は
        // この検証とコミットの間に割り込めない。
        let missing = self.collect_missing(&hashlist).await?;
        if !missing.is_empty() {
            tracing::debug!(
                "Rejected modify of {}: {} block(s) missing",
                filename,
                missing.len()
            );
            return Err(MetadataError::MissingBlocks { hashes: missing }.into());
        }

        record.version = version;
        record.hashlist = hashlist;
        record.tombstoned = false;

        tracing::debug!("Committed {} at version {}", filename, version);

        Ok(())
    }

    /// ファイルを削除 (tombstone 化)
    ///
    /// 一度も作成されていない filename には FileNotFound を返す。削除後も
    /// レコードはバージョンを保持し、tombstone-version+1 の modify で
    /// 再作成できる。
    #[instrument(level = "trace", name = "metadata_delete_file", skip(self), fields(filename, version))]
    pub async fn delete_file(&self, filename: &str, version: u64) -> RpcResult<()> {
        let Some(entry) = self.lookup_entry(filename) else {
            return Err(MetadataError::FileNotFound(filename.to_string()).into());
        };

        let mut record = entry.lock().await;

        // バージョン0のレコードは modify の失敗が残した予約にすぎない
        if !record.exists() {
            return Err(MetadataError::FileNotFound(filename.to_string()).into());
        }

        if version != record.version + 1 {
            tracing::debug!(
                "Rejected delete of {} at version {} (current {})",
                filename,
                version,
                record.version
            );
            return Err(MetadataError::VersionMismatch {
                current: record.version,
            }
            .into());
        }

        record.version = version;
        record.hashlist.clear();
        record.tombstoned = true;

        tracing::debug!("Tombstoned {} at version {}", filename, version);

        Ok(())
    }
}

#[async_trait]
impl MetadataRpc for MetadataManager {
    async fn read_file(&self, filename: &str) -> RpcResult<FileInfo> {
        self.read_file(filename).await
    }

    async fn modify_file(
        &self,
        filename: &str,
        version: u64,
        hashlist: Vec<BlockRef>,
    ) -> RpcResult<()> {
        self.modify_file(filename, version, hashlist).await
    }

    async fn delete_file(&self, filename: &str, version: u64) -> RpcResult<()> {
        self.delete_file(filename, version).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::chunking::block_hash;
    use crate::storage::BlockStore;

    /// n 個のシャードを持つマネージャーを作成
    fn manager_with_shards(n: usize) -> (Arc<MetadataManager>, Vec<Arc<BlockStore>>) {
        let stores: Vec<Arc<BlockStore>> = (0..n).map(|_| Arc::new(BlockStore::new())).collect();
        let shards: Vec<Arc<dyn ShardRpc>> = stores
            .iter()
            .map(|s| Arc::clone(s) as Arc<dyn ShardRpc>)
            .collect();
        (Arc::new(MetadataManager::new(shards)), stores)
    }

    /// ブロックをシャードに格納し、その BlockRef を返す
    fn store_block(stores: &[Arc<BlockStore>], shard: usize, data: &[u8]) -> BlockRef {
        let hash = block_hash(data);
        stores[shard].store(&hash, data.to_vec());
        BlockRef::new(hash, shard)
    }

    fn assert_version_mismatch(result: RpcResult<()>, expected_current: u64) {
        match result {
            Err(RpcError::Metadata(MetadataError::VersionMismatch { current })) => {
                assert_eq!(current, expected_current)
            }
            other => panic!("Expected VersionMismatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_never_created() {
        let (manager, _stores) = manager_with_shards(2);

        let info = manager.read_file("ghost.txt").await.unwrap();
        assert_eq!(info.version, 0);
        assert!(info.hashlist.is_none());
    }

    #[tokio::test]
    async fn test_modify_creates_at_version_one() {
        let (manager, stores) = manager_with_shards(2);

        let block = store_block(&stores, 1, b"first contents");
        manager
            .modify_file("a.txt", 1, vec![block.clone()])
            .await
            .unwrap();

        let info = manager.read_file("a.txt").await.unwrap();
        assert_eq!(info.version, 1);
        assert_eq!(info.hashlist, Some(vec![block]));
    }

    #[tokio::test]
    async fn test_modify_rejects_wrong_version() {
        let (manager, stores) = manager_with_shards(2);

        let block = store_block(&stores, 0, b"data");

        // 未作成ファイルへの v=2 は current=0 を返す
        let result = manager.modify_file("a.txt", 2, vec![block.clone()]).await;
        assert_version_mismatch(result, 0);

        // 作成後の同一バージョン再送も拒否
        manager.modify_file("a.txt", 1, vec![block.clone()]).await.unwrap();
        let result = manager.modify_file("a.txt", 1, vec![block]).await;
        assert_version_mismatch(result, 1);
    }

    #[tokio::test]
    async fn test_modify_reports_exact_missing_set() {
        let (manager, stores) = manager_with_shards(2);

        let stored = store_block(&stores, 0, b"present block");
        let absent_hash = block_hash(b"never stored");
        let hashlist = vec![stored, BlockRef::new(absent_hash.clone(), 1)];

        let result = manager.modify_file("a.txt", 1, hashlist).await;
        match result {
            Err(RpcError::Metadata(MetadataError::MissingBlocks { hashes })) => {
                assert_eq!(hashes, BTreeSet::from([absent_hash]));
            }
            other => panic!("Expected MissingBlocks, got {:?}", other),
        }

        // 変更は起きていない
        let info = manager.read_file("a.txt").await.unwrap();
        assert_eq!(info.version, 0);
        assert!(info.hashlist.is_none());
    }

    #[tokio::test]
    async fn test_modify_validates_assigned_shard_only() {
        let (manager, stores) = manager_with_shards(2);

        // ブロックはシャード0にある
        let data = b"misplaced block";
        let hash = block_hash(data);
        stores[0].store(&hash, data.to_vec());

        // ハッシュリストはシャード1を指しているので欠損扱い
        let result = manager
            .modify_file("a.txt", 1, vec![BlockRef::new(hash.clone(), 1)])
            .await;
        match result {
            Err(RpcError::Metadata(MetadataError::MissingBlocks { hashes })) => {
                assert_eq!(hashes, BTreeSet::from([hash]));
            }
            other => panic!("Expected MissingBlocks, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_modify_rejects_out_of_range_shard() {
        let (manager, _stores) = manager_with_shards(2);

        let result = manager
            .modify_file("a.txt", 1, vec![BlockRef::new(block_hash(b"x"), 2)])
            .await;
        assert!(matches!(result, Err(RpcError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_empty_hashlist_commits() {
        let (manager, _stores) = manager_with_shards(2);

        // 空ファイル: 検証対象なしでコミットされる
        manager.modify_file("empty.txt", 1, vec![]).await.unwrap();

        let info = manager.read_file("empty.txt").await.unwrap();
        assert_eq!(info.version, 1);
        assert_eq!(info.hashlist, Some(vec![]));
    }

    #[tokio::test]
    async fn test_versions_increase_by_one() {
        let (manager, stores) = manager_with_shards(2);

        let b1 = store_block(&stores, 0, b"v1");
        let b2 = store_block(&stores, 1, b"v2");

        manager.modify_file("a.txt", 1, vec![b1]).await.unwrap();
        manager.modify_file("a.txt", 2, vec![b2]).await.unwrap();
        manager.delete_file("a.txt", 3).await.unwrap();

        let info = manager.read_file("a.txt").await.unwrap();
        assert_eq!(info.version, 3);

        // ギャップのあるバージョンは常に拒否
        let b3 = store_block(&stores, 0, b"v4");
        let result = manager.modify_file("a.txt", 5, vec![b3]).await;
        assert_version_mismatch(result, 3);
    }

    #[tokio::test]
    async fn test_delete_never_created_is_file_not_found() {
        let (manager, _stores) = manager_with_shards(1);

        let result = manager.delete_file("ghost.txt", 1).await;
        assert!(matches!(
            result,
            Err(RpcError::Metadata(MetadataError::FileNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_delete_after_failed_modify_is_file_not_found() {
        let (manager, _stores) = manager_with_shards(1);

        // modify が失敗してバージョン0の予約だけ残った状態
        let result = manager
            .modify_file("a.txt", 1, vec![BlockRef::new(block_hash(b"x"), 0)])
            .await;
        assert!(result.is_err());

        // FileNotFound であって VersionMismatch ではない
        let result = manager.delete_file("a.txt", 1).await;
        assert!(matches!(
            result,
            Err(RpcError::Metadata(MetadataError::FileNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_delete_requires_exact_next_version() {
        let (manager, stores) = manager_with_shards(1);

        let block = store_block(&stores, 0, b"to delete");
        manager.modify_file("a.txt", 1, vec![block]).await.unwrap();

        let result = manager.delete_file("a.txt", 3).await;
        assert_version_mismatch(result, 1);

        manager.delete_file("a.txt", 2).await.unwrap();
    }

    #[tokio::test]
    async fn test_tombstone_read_and_recreate() {
        let (manager, stores) = manager_with_shards(2);

        let old = store_block(&stores, 0, b"old contents");
        manager.modify_file("a.txt", 1, vec![old]).await.unwrap();
        manager.delete_file("a.txt", 2).await.unwrap();

        // tombstone 中はバージョンのみ
        let info = manager.read_file("a.txt").await.unwrap();
        assert_eq!(info.version, 2);
        assert!(info.hashlist.is_none());

        // tombstone-version+1 で再作成
        let new = store_block(&stores, 1, b"new contents");
        manager
            .modify_file("a.txt", 3, vec![new.clone()])
            .await
            .unwrap();

        let info = manager.read_file("a.txt").await.unwrap();
        assert_eq!(info.version, 3);
        assert_eq!(info.hashlist, Some(vec![new]));
    }

    #[tokio::test]
    async fn test_delete_tombstoned_file_again() {
        let (manager, stores) = manager_with_shards(1);

        let block = store_block(&stores, 0, b"contents");
        manager.modify_file("a.txt", 1, vec![block]).await.unwrap();
        manager.delete_file("a.txt", 2).await.unwrap();

        // 作成済みなので存在チェックは通り、フェンスだけが効く
        manager.delete_file("a.txt", 3).await.unwrap();

        let info = manager.read_file("a.txt").await.unwrap();
        assert_eq!(info.version, 3);
        assert!(info.hashlist.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_modify_single_winner() {
        let (manager, stores) = manager_with_shards(2);

        let block_a = store_block(&stores, 0, b"writer A");
        let block_b = store_block(&stores, 1, b"writer B");

        // 同じ filename に同じ目標バージョンで同時に modify
        let m1 = Arc::clone(&manager);
        let m2 = Arc::clone(&manager);
        let t1 = tokio::spawn(async move { m1.modify_file("race.txt", 1, vec![block_a]).await });
        let t2 = tokio::spawn(async move { m2.modify_file("race.txt", 1, vec![block_b]).await });

        let results = [t1.await.unwrap(), t2.await.unwrap()];
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let mismatches = results
            .iter()
            .filter(|r| {
                matches!(
                    r,
                    Err(RpcError::Metadata(MetadataError::VersionMismatch { current: 1 }))
                )
            })
            .count();

        // ちょうど1つが勝ち、敗者は current=1 を観測する
        assert_eq!(wins, 1);
        assert_eq!(mismatches, 1);

        let info = manager.read_file("race.txt").await.unwrap();
        assert_eq!(info.version, 1);
    }

    #[tokio::test]
    async fn test_mutations_on_distinct_files_are_independent() {
        let (manager, stores) = manager_with_shards(2);

        let block_a = store_block(&stores, 0, b"file a");
        let block_b = store_block(&stores, 1, b"file b");

        manager.modify_file("a.txt", 1, vec![block_a]).await.unwrap();
        manager.modify_file("b.txt", 1, vec![block_b]).await.unwrap();

        assert_eq!(manager.read_file("a.txt").await.unwrap().version, 1);
        assert_eq!(manager.read_file("b.txt").await.unwrap().version, 1);
        assert_eq!(manager.tracked_file_count(), 2);
    }
}
