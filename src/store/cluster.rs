use crate::config::Config;
use crate::store::shard::{Shard, ShardConfig};
use crate::store::{Record, ShardOps, StoreError};
use std::sync::mpsc::sync_channel;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a. Routing must be stable across processes and releases, so
/// the hash is pinned here rather than delegated to `DefaultHasher`.
fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Shard index an id routes to in a cluster of `num_shards`.
pub fn shard_for(id: &str, num_shards: usize) -> usize {
    (fnv1a(id.as_bytes()) as usize) % num_shards
}

/// Hash-partitioned front-end over an ordered set of shards.
///
/// Writes route to `fnv1a(id) % num_shards`; the shard order never changes
/// for the lifetime of the cluster, so an id always lands on the same shard.
/// Reads fan out to every shard in parallel and merge by descending score.
pub struct Cluster {
    shards: Vec<Arc<dyn ShardOps>>,
}

impl Cluster {
    /// Wraps pre-built shard handles (direct or replicated).
    pub fn new(shards: Vec<Arc<dyn ShardOps>>) -> Self {
        assert!(!shards.is_empty(), "cluster requires at least one shard");
        Self { shards }
    }

    /// Builds `num_shards` direct in-memory shards under
    /// `data_dir/shard_N/meta.bin`.
    pub fn open(config: &Config, cancel: CancellationToken) -> anyhow::Result<Self> {
        let shard_config = ShardConfig {
            dim: config.dim,
            page_bytes: config.page_bytes,
            ivf_clusters: config.ivf_clusters,
            ivf_iterations: config.ivf_iterations,
            ivf_auto_tune: config.ivf_auto_tune,
        };
        let mut shards: Vec<Arc<dyn ShardOps>> = Vec::with_capacity(config.num_shards);
        for i in 0..config.num_shards {
            let dir = std::path::Path::new(&config.data_dir).join(format!("shard_{i}"));
            std::fs::create_dir_all(&dir)?;
            let shard = Shard::open(shard_config.clone(), dir.join("meta.bin"), cancel.clone())?;
            shards.push(Arc::new(shard));
        }
        Ok(Self::new(shards))
    }

    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    /// Total vectors across all shards.
    pub fn len(&self) -> u64 {
        self.shards.iter().map(|s| s.len() as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shard index an id routes to. Deterministic and idempotent.
    pub fn route(&self, id: &str) -> usize {
        shard_for(id, self.shards.len())
    }

    pub fn insert(&self, id: &str, vector: &[f32], meta: &[u8]) -> Result<(), StoreError> {
        self.shards[self.route(id)].insert(id, vector, meta)
    }

    pub fn get(&self, id: &str) -> Result<Option<(Vec<f32>, Vec<u8>)>, StoreError> {
        self.shards[self.route(id)].get(id)
    }

    /// Scatter-gather search: every shard contributes up to `k` records,
    /// the merged set is sorted by descending score and truncated to `k`.
    /// Best-effort: a shard that fails is logged and contributes nothing.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<Record> {
        let (tx, rx) = sync_channel(self.shards.len());
        rayon::scope(|scope| {
            for shard in &self.shards {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let _ = tx.send(shard.search(query, k));
                });
            }
        });
        drop(tx);

        let mut merged = Vec::with_capacity(k.saturating_mul(self.shards.len()));
        for result in rx {
            match result {
                Ok(records) => merged.extend(records),
                Err(err) => tracing::warn!(error = %err, "shard search failed"),
            }
        }
        merged.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        merged.truncate(k);
        merged
    }

    /// Trains every shard concurrently; waits for the slowest. The first
    /// shard error is returned, the rest are logged.
    pub fn train(&self) -> Result<(), StoreError> {
        let (tx, rx) = sync_channel(self.shards.len());
        rayon::scope(|scope| {
            for shard in &self.shards {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let _ = tx.send(shard.train());
                });
            }
        });
        drop(tx);

        let mut first_err = None;
        for result in rx {
            if let Err(err) = result {
                tracing::warn!(error = %err, "shard train failed");
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_matches_reference_values() {
        // published FNV-1a 32-bit test vectors
        assert_eq!(fnv1a(b""), 0x811c9dc5);
        assert_eq!(fnv1a(b"a"), 0xe40c292c);
        assert_eq!(fnv1a(b"foobar"), 0xbf9cf968);
    }

    #[test]
    fn routing_is_idempotent() {
        let hash = fnv1a(b"vec-0");
        for _ in 0..16 {
            assert_eq!(fnv1a(b"vec-0"), hash);
        }
    }
}
