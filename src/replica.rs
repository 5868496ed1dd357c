//! Replication boundary.
//!
//! In a multi-node deployment every write is serialized through a consensus
//! log before it touches a shard. The transport lives outside this crate;
//! here are the pieces both sides agree on: the [`Command`] wire record, the
//! [`CommandLog`] submission seam, and [`ReplicatedShard`], a shard variant
//! that routes inserts through the log and serves reads from local state.

use crate::store::{Record, ShardOps, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const OP_INSERT: &str = "insert";

/// The replicated command record. JSON-encoded on the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Command {
    pub op: String,
    pub id: String,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub meta: serde_json::Value,
}

impl Command {
    pub fn insert(id: &str, vector: &[f32], meta: &serde_json::Value) -> Self {
        Self {
            op: OP_INSERT.to_string(),
            id: id.to_string(),
            vector: vector.to_vec(),
            meta: meta.clone(),
        }
    }

    /// Applies a committed command to a shard. Only `insert` is recognized;
    /// anything else is rejected so a newer peer cannot smuggle unknown
    /// operations past an older state machine.
    pub fn apply(&self, shard: &dyn ShardOps) -> Result<(), StoreError> {
        match self.op.as_str() {
            OP_INSERT => {
                let meta = serde_json::to_vec(&self.meta)?;
                shard.insert(&self.id, &self.vector, &meta)
            }
            other => Err(StoreError::Replication(anyhow::anyhow!(
                "unknown command op: {other}"
            ))),
        }
    }
}

/// Submission seam for the external consensus log. `submit` returns once
/// the command is committed and applied (or rejected) by the state machine.
pub trait CommandLog: Send + Sync {
    fn submit(&self, command: &Command) -> anyhow::Result<()>;
}

/// Shard variant for replicated deployments: inserts are submitted as
/// commands and reach the local shard via the log's apply path; get, search
/// and train stay local.
pub struct ReplicatedShard<L: CommandLog> {
    log: L,
    local: Arc<dyn ShardOps>,
}

impl<L: CommandLog> ReplicatedShard<L> {
    pub fn new(log: L, local: Arc<dyn ShardOps>) -> Self {
        Self { log, local }
    }
}

impl<L: CommandLog> ShardOps for ReplicatedShard<L> {
    fn insert(&self, id: &str, vector: &[f32], meta: &[u8]) -> Result<(), StoreError> {
        // the command record is JSON on the wire, so the blob must parse
        let meta: serde_json::Value = serde_json::from_slice(meta)?;
        let command = Command::insert(id, vector, &meta);
        self.log.submit(&command).map_err(StoreError::Replication)
    }

    fn get(&self, id: &str) -> Result<Option<(Vec<f32>, Vec<u8>)>, StoreError> {
        self.local.get(id)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Record>, StoreError> {
        self.local.search(query, k)
    }

    fn train(&self) -> Result<bool, StoreError> {
        self.local.train()
    }

    fn len(&self) -> u32 {
        self.local.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Shard, ShardConfig};
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    /// Single-node stand-in for the consensus log: applies on submit.
    struct LoopbackLog {
        shard: Arc<dyn ShardOps>,
    }

    impl CommandLog for LoopbackLog {
        fn submit(&self, command: &Command) -> anyhow::Result<()> {
            command.apply(self.shard.as_ref())?;
            Ok(())
        }
    }

    fn local_shard(dir: &std::path::Path) -> Arc<dyn ShardOps> {
        let config = ShardConfig {
            dim: 2,
            page_bytes: 1 << 16,
            ivf_clusters: 4,
            ivf_iterations: 5,
            ivf_auto_tune: false,
        };
        Arc::new(Shard::open(config, dir.join("meta.bin"), CancellationToken::new()).unwrap())
    }

    #[test]
    fn insert_flows_through_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let local = local_shard(dir.path());
        let replicated = ReplicatedShard::new(
            LoopbackLog {
                shard: local.clone(),
            },
            local,
        );

        replicated.insert("a", &[1.0, 0.0], br#"{"n":1}"#).unwrap();
        let (vector, meta) = replicated.get("a").unwrap().unwrap();
        assert_eq!(vector, vec![1.0, 0.0]);
        assert_eq!(meta, br#"{"n":1}"#);
        assert_eq!(replicated.len(), 1);
    }

    #[test]
    fn unknown_op_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let local = local_shard(dir.path());
        let command = Command {
            op: "delete".to_string(),
            id: "a".to_string(),
            vector: vec![],
            meta: json!(null),
        };
        assert!(matches!(
            command.apply(local.as_ref()),
            Err(StoreError::Replication(_))
        ));
        assert_eq!(local.len(), 0);
    }

    #[test]
    fn command_wire_shape_round_trips() {
        let command = Command::insert("k", &[0.5, 0.25], &json!({"tag": "x"}));
        let encoded = serde_json::to_string(&command).unwrap();
        let decoded: Command = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.op, OP_INSERT);
        assert_eq!(decoded.id, "k");
        assert_eq!(decoded.vector, vec![0.5, 0.25]);
        assert_eq!(decoded.meta, json!({"tag": "x"}));
    }
}
