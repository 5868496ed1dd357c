pub mod arena;
pub mod cluster;
pub mod heap;
pub mod ivf;
pub mod metalog;
pub mod shard;
pub mod simd;

pub use arena::VectorArena;
pub use cluster::Cluster;
pub use ivf::IvfIndex;
pub use metalog::{LogLocation, MetaLog};
pub use shard::{Shard, ShardConfig};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("vector dimension mismatch: expected {expected}, got {got}")]
    DimMismatch { expected: usize, got: usize },
    #[error("index {index} out of bounds (size {size})")]
    OutOfBounds { index: u32, size: u32 },
    #[error("id must not be empty")]
    EmptyId,
    #[error("id already exists")]
    IdExists,
    #[error("metadata encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Replication(anyhow::Error),
}

/// A search hit materialized for the caller: the stored id, its cosine
/// similarity against the query, and the raw metadata bytes (empty when a
/// degraded read lost them).
#[derive(Clone, Debug)]
pub struct Record {
    pub id: String,
    pub score: f32,
    pub meta: Vec<u8>,
}

/// The capability set a shard exposes to the router, the HTTP layer, and
/// the replication boundary. Implemented by the direct in-memory [`Shard`]
/// and by [`crate::replica::ReplicatedShard`], which submits writes through
/// a command log and reads locally.
pub trait ShardOps: Send + Sync {
    /// Stores a vector under `id` with an opaque metadata blob. Callers
    /// serialize structured metadata before crossing this boundary.
    fn insert(&self, id: &str, vector: &[f32], meta: &[u8]) -> Result<(), StoreError>;
    fn get(&self, id: &str) -> Result<Option<(Vec<f32>, Vec<u8>)>, StoreError>;
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Record>, StoreError>;
    /// Returns `Ok(false)` when training was skipped (not enough vectors,
    /// or cancelled); the previous index stays published either way.
    fn train(&self) -> Result<bool, StoreError>;
    fn len(&self) -> u32;
}
