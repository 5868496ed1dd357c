use crate::store::arena::VectorArena;
use crate::store::heap::{Match, TopK};
use crate::store::ivf::IvfIndex;
use crate::store::metalog::{LogLocation, MetaLog};
use crate::store::{simd, Record, ShardOps, StoreError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-shard tunables, fixed at construction.
#[derive(Clone, Debug)]
pub struct ShardConfig {
    pub dim: usize,
    pub page_bytes: usize,
    pub ivf_clusters: usize,
    pub ivf_iterations: usize,
    pub ivf_auto_tune: bool,
}

/// One shard of the cluster: hot-path vector storage in the arena, cold-path
/// metadata in the append-only log, and an optional IVF index over both.
///
/// A single readers-writer lock guards the id maps and the IVF publication;
/// the arena and the metadata log carry their own inner locks. Lock order is
/// always shard state first, inner locks second. Inserts are totally ordered
/// by the write lock, so reads are linearizable per shard.
pub struct Shard {
    config: ShardConfig,
    arena: VectorArena,
    meta_log: MetaLog,
    state: RwLock<ShardState>,
    cancel: CancellationToken,
}

struct ShardState {
    ids: HashMap<String, u32>,
    rev: Vec<String>,
    meta_locs: Vec<LogLocation>,
    ivf: Arc<IvfIndex>,
}

impl Shard {
    pub fn open(
        config: ShardConfig,
        meta_path: impl AsRef<Path>,
        cancel: CancellationToken,
    ) -> Result<Self, StoreError> {
        let arena = VectorArena::new(config.dim, config.page_bytes);
        let meta_log = MetaLog::open(meta_path)?;
        let ivf = Arc::new(IvfIndex::untrained(config.ivf_clusters));
        Ok(Self {
            config,
            arena,
            meta_log,
            state: RwLock::new(ShardState {
                ids: HashMap::new(),
                rev: Vec::new(),
                meta_locs: Vec::new(),
                ivf,
            }),
            cancel,
        })
    }

    pub fn dim(&self) -> usize {
        self.config.dim
    }

    /// True once a train call has published centroids.
    pub fn is_trained(&self) -> bool {
        self.state.read().ivf.is_trained()
    }

    fn brute_force(&self, query: &[f32], k: usize) -> Vec<Match> {
        let mut heap = TopK::new(k);
        self.arena.scan(|index, vector| {
            let score = simd::cosine(query, vector);
            heap.offer(Match { index, score });
        });
        heap.into_sorted()
    }

    /// Resolves heap matches into records: reverse-map the id, load the
    /// metadata blob. A failed metadata read degrades to empty bytes rather
    /// than dropping the record.
    fn materialize(&self, state: &ShardState, matches: Vec<Match>) -> Vec<Record> {
        let mut records = Vec::with_capacity(matches.len());
        for m in matches {
            let idx = m.index as usize;
            let Some(id) = state.rev.get(idx) else {
                continue;
            };
            let meta = match self.meta_log.read_at(state.meta_locs[idx]) {
                Ok(bytes) => bytes,
                Err(err) => {
                    tracing::warn!(error = %err, index = m.index, "metadata read failed");
                    Vec::new()
                }
            };
            records.push(Record {
                id: id.clone(),
                score: m.score,
                meta,
            });
        }
        records
    }
}

impl ShardOps for Shard {
    fn insert(&self, id: &str, vector: &[f32], meta: &[u8]) -> Result<(), StoreError> {
        if id.is_empty() {
            return Err(StoreError::EmptyId);
        }
        if vector.len() != self.config.dim {
            return Err(StoreError::DimMismatch {
                expected: self.config.dim,
                got: vector.len(),
            });
        }

        let mut state = self.state.write();
        if state.ids.contains_key(id) {
            return Err(StoreError::IdExists);
        }

        let loc = self.meta_log.append(meta)?;
        let index = self.arena.push(vector)?;

        state.ids.insert(id.to_string(), index);
        state.rev.push(id.to_string());
        state.meta_locs.push(loc);
        debug_assert_eq!(state.rev.len() as u32, index + 1);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<(Vec<f32>, Vec<u8>)>, StoreError> {
        let state = self.state.read();
        let Some(&index) = state.ids.get(id) else {
            return Ok(None);
        };
        let vector = self.arena.get(index)?;
        let meta = match self.meta_log.read_at(state.meta_locs[index as usize]) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, index, "metadata read failed");
                Vec::new()
            }
        };
        Ok(Some((vector, meta)))
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Record>, StoreError> {
        if query.len() != self.config.dim {
            return Err(StoreError::DimMismatch {
                expected: self.config.dim,
                got: query.len(),
            });
        }
        let state = self.state.read();
        if k == 0 || self.arena.is_empty() {
            return Ok(Vec::new());
        }

        let ivf = state.ivf.clone();
        let matches = if ivf.is_trained() {
            ivf.search(&self.arena, query, k)
        } else {
            self.brute_force(query, k)
        };
        Ok(self.materialize(&state, matches))
    }

    /// Re-trains the IVF index over the current arena contents.
    ///
    /// The k-means sweeps run against the arena's own lock, so readers keep
    /// scanning the previous index snapshot throughout; the shard write lock
    /// is taken only to publish the finished index. Vectors inserted while
    /// training is in flight are invisible to the new buckets until the next
    /// train call. Returns `Ok(false)` when training was skipped: fewer
    /// vectors than clusters, or shutdown cancellation.
    fn train(&self) -> Result<bool, StoreError> {
        let n = self.arena.len();

        let clusters = if self.config.ivf_auto_tune && n > 0 {
            ((n as f64).sqrt() as usize).clamp(10, 5000)
        } else {
            self.config.ivf_clusters
        };

        match IvfIndex::train(
            &self.arena,
            clusters,
            self.config.ivf_iterations,
            &self.cancel,
        ) {
            Some(ivf) => {
                self.state.write().ivf = Arc::new(ivf);
                tracing::info!(vectors = n, clusters, "ivf index published");
                Ok(true)
            }
            None => {
                tracing::info!(vectors = n, clusters, "ivf training skipped");
                Ok(false)
            }
        }
    }

    fn len(&self) -> u32 {
        self.arena.len()
    }
}
