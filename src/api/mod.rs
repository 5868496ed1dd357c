pub mod errors;
pub mod routes_vectors;

use crate::config::Config;
use crate::metrics::Metrics;
use crate::store::Cluster;
use crate::wal::Wal;
use axum::routing::{get, post};
use axum::Router;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub cluster: Arc<Cluster>,
    pub wal: Option<Arc<Mutex<Wal>>>,
    pub metrics: Arc<Metrics>,
    pub config: Config,
}

pub fn router(
    cluster: Arc<Cluster>,
    wal: Option<Arc<Mutex<Wal>>>,
    metrics: Arc<Metrics>,
    config: Config,
) -> Router {
    let state = AppState {
        cluster,
        wal,
        metrics,
        config,
    };
    Router::new()
        .route("/api/v1/insert", post(routes_vectors::insert))
        .route("/api/v1/search", post(routes_vectors::search))
        .route("/admin/index", post(routes_vectors::create_index))
        .route("/health", get(routes_vectors::health))
        .route("/metrics", get(routes_vectors::metrics))
        .with_state(state)
}
