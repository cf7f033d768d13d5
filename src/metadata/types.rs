use serde::{Deserialize, Serialize};

/// ブロックハッシュ (SHA-256 hex digest)
pub type BlockHash = String;

/// シャードインデックス (設定ファイルのシャード一覧での位置)
pub type ShardIndex = usize;

/// ハッシュリストの1エントリ
///
/// ブロックのハッシュと、そのブロックを保持するシャードの組。
/// ハッシュリスト内の順序がファイル再構築時の連結順序を定義する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    /// ブロックのコンテンツハッシュ
    pub hash: BlockHash,

    /// ブロックが配置されているシャード
    pub shard: ShardIndex,
}

impl BlockRef {
    /// 新しいハッシュリストエントリを作成
    pub fn new(hash: BlockHash, shard: ShardIndex) -> Self {
        Self { hash, shard }
    }
}

/// ファイルレコード
///
/// メタデータ権限者が filename ごとに保持する状態。バージョンは受理された
/// 変更 (modify/delete) ごとに正確に1ずつ増加する。削除はレコードを物理的に
/// 消さず、tombstone フラグを立ててバージョンを保持する。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// 現在のバージョン (0 = 未作成)
    pub version: u64,

    /// ブロック参照の順序付きリスト
    pub hashlist: Vec<BlockRef>,

    /// 削除済みフラグ
    pub tombstoned: bool,
}

impl FileRecord {
    /// ファイルが一度でも作成されたか
    pub fn exists(&self) -> bool {
        self.version > 0
    }

    /// 読み出しスナップショットを作成
    ///
    /// tombstone 中および未作成のレコードはハッシュリストを持たない。
    pub fn snapshot(&self) -> FileInfo {
        let hashlist = if self.version == 0 || self.tombstoned {
            None
        } else {
            Some(self.hashlist.clone())
        };

        FileInfo {
            version: self.version,
            hashlist,
        }
    }
}

/// read 操作の結果
///
/// 未作成のファイルは (0, None)、tombstone 中は (version, None)、
/// それ以外は (version, Some(hashlist)) を返す。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// 現在のバージョン
    pub version: u64,

    /// ハッシュリスト (存在しない/削除済みの場合は None)
    pub hashlist: Option<Vec<BlockRef>>,
}

impl FileInfo {
    /// ダウンロード可能な内容を持つか
    pub fn is_present(&self) -> bool {
        self.version > 0 && self.hashlist.is_some()
    }
}
