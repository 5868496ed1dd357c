use crate::store::arena::VectorArena;
use crate::store::heap::{Match, TopK};
use crate::store::simd;
use tokio_util::sync::CancellationToken;

/// Inverted-file index over the arena.
///
/// `centroids[c]` is the mean of the vectors assigned to cluster `c`;
/// `buckets[c]` holds their arena indices as of the final training sweep.
/// An instance is immutable once built: the shard publishes a freshly
/// trained index by replacing an `Arc`, so scanners always hold a coherent
/// snapshot.
pub struct IvfIndex {
    num_clusters: usize,
    centroids: Vec<Vec<f32>>,
    buckets: Vec<Vec<u32>>,
    trained: bool,
}

impl IvfIndex {
    /// A placeholder index that routes every search to brute force.
    pub fn untrained(num_clusters: usize) -> Self {
        Self {
            num_clusters,
            centroids: Vec::new(),
            buckets: Vec::new(),
            trained: false,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    pub fn num_clusters(&self) -> usize {
        self.num_clusters
    }

    pub fn centroids(&self) -> &[Vec<f32>] {
        &self.centroids
    }

    pub fn buckets(&self) -> &[Vec<u32>] {
        &self.buckets
    }

    /// Runs k-means over the arena and returns a trained index.
    ///
    /// Returns `None` when there are fewer vectors than clusters (the index
    /// stays useless below that) or when `cancel` fires mid-training; the
    /// caller keeps whatever index it had.
    ///
    /// Seeding is deterministic even striding: seed `k` copies the vector at
    /// index `k * (n / num_clusters)`, the last seed clamped into range.
    /// Each Lloyd iteration assigns every vector to its argmax-cosine
    /// centroid (ties to the lowest cluster), accumulates per-cluster sums
    /// and counts, then moves each non-empty centroid to its mean; empty
    /// clusters keep their previous centroid. Bucket membership is captured
    /// during the final sweep.
    pub fn train(
        arena: &VectorArena,
        num_clusters: usize,
        iterations: usize,
        cancel: &CancellationToken,
    ) -> Option<IvfIndex> {
        let n = arena.len() as usize;
        if n < num_clusters || num_clusters == 0 {
            return None;
        }
        let dim = arena.dim();

        let mut centroids: Vec<Vec<f32>> = Vec::with_capacity(num_clusters);
        let step = n / num_clusters;
        for k in 0..num_clusters {
            let idx = ((k * step).min(n - 1)) as u32;
            centroids.push(arena.get(idx).ok()?);
        }

        let mut buckets: Vec<Vec<u32>> = vec![Vec::new(); num_clusters];
        for iter in 0..iterations.max(1) {
            if cancel.is_cancelled() {
                return None;
            }
            let last = iter == iterations.max(1) - 1;
            let mut sums = vec![vec![0.0f32; dim]; num_clusters];
            let mut counts = vec![0u32; num_clusters];
            let mut cancelled = false;

            arena.scan(|index, vector| {
                if cancelled {
                    return;
                }
                if index % 4096 == 0 && cancel.is_cancelled() {
                    cancelled = true;
                    return;
                }
                let cluster = nearest_centroid(&centroids, vector);
                let sum = &mut sums[cluster];
                for (dst, &src) in sum.iter_mut().zip(vector.iter()) {
                    *dst += src;
                }
                counts[cluster] += 1;
                if last {
                    buckets[cluster].push(index);
                }
            });
            if cancelled {
                return None;
            }

            for (c, count) in counts.iter().enumerate() {
                if *count > 0 {
                    let inv = 1.0f32 / *count as f32;
                    for value in sums[c].iter_mut() {
                        *value *= inv;
                    }
                    centroids[c] = std::mem::take(&mut sums[c]);
                }
            }
        }

        let index = IvfIndex {
            num_clusters,
            centroids,
            buckets,
            trained: true,
        };
        index.log_bucket_stats();
        Some(index)
    }

    /// Single-probe approximate search: pick the best centroid for the
    /// query, then score only that bucket.
    pub fn search(&self, arena: &VectorArena, query: &[f32], k: usize) -> Vec<Match> {
        if !self.trained || self.centroids.is_empty() {
            return Vec::new();
        }
        let best = nearest_centroid(&self.centroids, query);

        let mut heap = TopK::new(k);
        for &index in &self.buckets[best] {
            let score = match arena.read(index, |v| simd::cosine(query, v)) {
                Ok(score) => score,
                Err(_) => continue,
            };
            heap.offer(Match { index, score });
        }
        heap.into_sorted()
    }

    fn log_bucket_stats(&self) {
        let non_empty = self.buckets.iter().filter(|b| !b.is_empty()).count();
        let max = self.buckets.iter().map(Vec::len).max().unwrap_or(0);
        let total: usize = self.buckets.iter().map(Vec::len).sum();
        tracing::debug!(
            clusters = self.num_clusters,
            non_empty,
            max_bucket = max,
            indexed = total,
            "ivf trained"
        );
    }
}

/// Argmax cosine over the centroid list; ties resolve to the lowest index.
fn nearest_centroid(centroids: &[Vec<f32>], vector: &[f32]) -> usize {
    let mut best = 0usize;
    let mut best_score = f32::MIN;
    for (c, centroid) in centroids.iter().enumerate() {
        let score = simd::cosine(centroid, vector);
        if score > best_score {
            best_score = score;
            best = c;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::arena::DEFAULT_PAGE_BYTES;

    fn arena_with(vectors: &[Vec<f32>]) -> VectorArena {
        let arena = VectorArena::new(vectors[0].len(), DEFAULT_PAGE_BYTES);
        for v in vectors {
            arena.push(v).unwrap();
        }
        arena
    }

    #[test]
    fn too_few_vectors_stays_untrained() {
        let arena = arena_with(&[vec![1.0, 0.0], vec![0.0, 1.0]]);
        let trained = IvfIndex::train(&arena, 4, 5, &CancellationToken::new());
        assert!(trained.is_none());
    }

    #[test]
    fn trained_index_has_full_centroid_set_and_in_range_buckets() {
        let mut vectors = Vec::new();
        for i in 0..40 {
            let angle = i as f32 * 0.157;
            vectors.push(vec![angle.cos(), angle.sin()]);
        }
        let arena = arena_with(&vectors);
        let ivf = IvfIndex::train(&arena, 4, 5, &CancellationToken::new()).unwrap();

        assert!(ivf.is_trained());
        assert_eq!(ivf.centroids().len(), 4);
        let mut seen: Vec<u32> = ivf.buckets().iter().flatten().copied().collect();
        seen.sort_unstable();
        assert!(seen.iter().all(|&i| i < arena.len()));
        seen.dedup();
        assert_eq!(seen.len() as u32, arena.len(), "each vector in one bucket");
    }

    #[test]
    fn separated_clusters_are_found() {
        let mut vectors = Vec::new();
        for i in 0..16 {
            vectors.push(vec![1.0, 0.001 * i as f32, 0.0]);
            vectors.push(vec![0.0, 0.001 * i as f32, 1.0]);
        }
        let arena = arena_with(&vectors);
        let ivf = IvfIndex::train(&arena, 2, 8, &CancellationToken::new()).unwrap();

        let hits = ivf.search(&arena, &[1.0, 0.0, 0.0], 4);
        assert_eq!(hits.len(), 4);
        for m in &hits {
            let v = arena.get(m.index).unwrap();
            assert!(v[0] > 0.9, "probe pulled from the wrong cluster: {v:?}");
        }
    }

    #[test]
    fn cancelled_training_publishes_nothing() {
        let vectors: Vec<Vec<f32>> = (0..32).map(|i| vec![i as f32, 1.0]).collect();
        let arena = arena_with(&vectors);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(IvfIndex::train(&arena, 4, 5, &cancel).is_none());
    }
}
