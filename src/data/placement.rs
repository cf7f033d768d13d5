use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;

use crate::metadata::ShardIndex;
use crate::rpc::{RpcError, RpcResult, ShardRpc};

/// ブロック配置戦略
///
/// ブロックをどのシャードに配置するかをブロックごとに独立に決定する。
/// 配置はルーティングであってレプリケーションではない。1ブロックは
/// ちょうど1シャードに属する。
#[async_trait]
pub trait PlacementStrategy: Send + Sync {
    /// 指定されたブロックを配置するシャードを決定
    ///
    /// # Arguments
    /// * `hash` - ブロックのコンテンツハッシュ (hex)
    ///
    /// # Returns
    /// 配置先のシャードインデックス
    async fn place_block(&self, hash: &str) -> RpcResult<ShardIndex>;

    /// シャード数を取得
    fn shard_count(&self) -> usize;
}

/// 決定論的配置戦略
///
/// ハッシュ全体を大きな整数と見なし、シャード数 B で剰余を取る。
/// 同一ハッシュは常に同一シャードにマッピングされる。
pub struct DeterministicPlacement {
    /// シャード数
    shard_count: usize,
}

impl DeterministicPlacement {
    /// 新しい決定論的配置戦略を作成
    pub fn new(shard_count: usize) -> Self {
        Self { shard_count }
    }

    /// hexダイジェスト全体の mod を桁ごとに計算
    ///
    /// (acc * 16 + digit) mod B を左から畳み込むと、256bit整数を直接
    /// 構築した場合の剰余と一致する。多倍長整数は不要。
    fn digest_mod(hash: &str, modulus: usize) -> ShardIndex {
        hash.chars()
            .filter_map(|c| c.to_digit(16))
            .fold(0usize, |acc, digit| (acc * 16 + digit as usize) % modulus)
    }
}

#[async_trait]
impl PlacementStrategy for DeterministicPlacement {
    async fn place_block(&self, hash: &str) -> RpcResult<ShardIndex> {
        if self.shard_count == 0 {
            return Err(RpcError::Protocol("no shards configured".to_string()));
        }

        Ok(Self::digest_mod(hash, self.shard_count))
    }

    fn shard_count(&self) -> usize {
        self.shard_count
    }
}

/// レイテンシ測定配置戦略
///
/// 配置のたびに全シャードへ同時に ping を送り、観測 RTT が最小の
/// シャードを選ぶ。同値の場合は最小値を最初に観測したシャード
/// (インデックスが小さい方) が勝つ。測定結果はキャッシュしない。
pub struct LatencyProbePlacement {
    /// プローブ対象のシャード (インデックス順)
    shards: Vec<Arc<dyn ShardRpc>>,
}

impl LatencyProbePlacement {
    /// 新しいレイテンシ測定配置戦略を作成
    pub fn new(shards: Vec<Arc<dyn ShardRpc>>) -> Self {
        Self { shards }
    }

    /// 全シャードを同時にプローブし、各シャードの RTT を返す
    async fn probe_all(&self) -> Vec<RpcResult<Duration>> {
        let probes = self.shards.iter().map(|shard| {
            let shard = Arc::clone(shard);
            async move {
                let start = Instant::now();
                shard.ping().await?;
                Ok::<_, RpcError>(start.elapsed())
            }
        });

        join_all(probes).await
    }
}

#[async_trait]
impl PlacementStrategy for LatencyProbePlacement {
    async fn place_block(&self, _hash: &str) -> RpcResult<ShardIndex> {
        if self.shards.is_empty() {
            return Err(RpcError::Protocol("no shards configured".to_string()));
        }

        let mut best: Option<(ShardIndex, Duration)> = None;
        for (index, rtt) in self.probe_all().await.into_iter().enumerate() {
            let rtt = rtt?;

            // 厳密な < 比較: 同値なら先に観測した方を保持する
            match best {
                Some((_, best_rtt)) if rtt >= best_rtt => {}
                _ => best = Some((index, rtt)),
            }
        }

        let (index, rtt) = best.ok_or_else(|| RpcError::Protocol("no probe result".to_string()))?;
        tracing::trace!("Latency probe selected shard {} ({:?})", index, rtt);

        Ok(index)
    }

    fn shard_count(&self) -> usize {
        self.shards.len()
    }
}
