use crate::api::errors::ApiError;
use crate::api::AppState;
use crate::wal::OP_INSERT;
use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;

#[derive(Debug, Deserialize)]
pub struct InsertRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub vector: Vec<f32>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub vector: Vec<f32>,
    #[serde(default)]
    pub k: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
    pub metadata: serde_json::Value,
}

pub async fn insert(
    State(state): State<AppState>,
    Json(payload): Json<InsertRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let start = Instant::now();
    if payload.id.is_empty() || payload.vector.is_empty() {
        return Err(ApiError::bad_request("id and vector are required"));
    }

    let cluster = state.cluster.clone();
    let wal = state.wal.clone();
    let result = tokio::task::spawn_blocking(move || {
        let meta = serde_json::to_vec(&payload.metadata)?;
        cluster.insert(&payload.id, &payload.vector, &meta)?;
        if let Some(wal) = wal {
            if let Err(err) = wal
                .lock()
                .append(OP_INSERT, &payload.id, &payload.vector, &meta)
            {
                tracing::warn!(error = %err, "wal append failed");
            }
        }
        Ok::<_, crate::store::StoreError>(())
    })
    .await
    .map_err(|err| ApiError::internal(err.to_string()))?;

    state.metrics.observe_insert(start.elapsed());
    result?;
    state.metrics.set_vectors(state.cluster.len());
    Ok(Json(json!({ "message": "data inserted successfully" })))
}

pub async fn search(
    State(state): State<AppState>,
    Json(payload): Json<SearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let start = Instant::now();
    if payload.vector.is_empty() {
        return Err(ApiError::bad_request("vector is required"));
    }
    // the fan-out is best-effort and drops per-shard errors, so a bad query
    // dimension must be rejected here rather than surfacing as empty results
    if payload.vector.len() != state.config.dim {
        return Err(ApiError::bad_request(format!(
            "vector dimension mismatch: expected {}, got {}",
            state.config.dim,
            payload.vector.len()
        )));
    }
    let k = match payload.k {
        Some(k) if k > 0 => (k as usize).min(state.config.max_k),
        _ => state.config.default_k,
    };

    let cluster = state.cluster.clone();
    let query = payload.vector;
    let records = tokio::task::spawn_blocking(move || cluster.search(&query, k))
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?;

    state.metrics.observe_search(start.elapsed());
    let results = records
        .into_iter()
        .map(|record| {
            let metadata =
                serde_json::from_slice(&record.meta).unwrap_or(serde_json::Value::Null);
            SearchResult {
                id: record.id,
                score: record.score,
                metadata,
            }
        })
        .collect();
    Ok(Json(SearchResponse { results }))
}

/// Kicks off cluster-wide IVF training in the background and returns
/// immediately; progress lands in the logs.
pub async fn create_index(State(state): State<AppState>) -> impl IntoResponse {
    let cluster = state.cluster.clone();
    tokio::task::spawn_blocking(move || {
        if let Err(err) = cluster.train() {
            tracing::error!(error = %err, "index creation failed");
        }
    });
    Json(json!({ "status": "index_creation_started" }))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "vectors": state.cluster.len(),
        "shards": state.cluster.num_shards(),
    }))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.set_vectors(state.cluster.len());
    state.metrics.render()
}
