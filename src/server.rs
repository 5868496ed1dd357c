use anyhow::Context;
use vexel::api;
use vexel::config::Config;
use vexel::metrics::Metrics;
use vexel::store::Cluster;
use vexel::wal::Wal;
use parking_lot::Mutex;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn run(config: Config) -> anyhow::Result<()> {
    ensure_data_dir(&config.data_dir)?;

    let shutdown = CancellationToken::new();
    let cluster = Arc::new(Cluster::open(&config, shutdown.clone()).context("open cluster")?);
    let metrics = Arc::new(Metrics::default());

    let wal = if config.wal_enabled {
        let path = Path::new(&config.data_dir).join("wal.bin");
        let applied = replay_wal(&path, &cluster)?;
        tracing::info!(applied, "replayed wal records");
        metrics.set_vectors(cluster.len());
        Some(Arc::new(Mutex::new(
            Wal::open(&path).context("open wal")?,
        )))
    } else {
        None
    };

    let app = api::router(cluster, wal, metrics, config.clone());
    let addr = SocketAddr::new(config.bind_addr, config.port);

    tracing::info!(%addr, shards = config.num_shards, dim = config.dim, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

fn ensure_data_dir(path: &str) -> anyhow::Result<()> {
    let p = Path::new(path);
    if !p.exists() {
        fs::create_dir_all(p)?;
    } else if !p.is_dir() {
        anyhow::bail!("DATA_DIR exists but is not a directory: {}", p.display());
    }
    Ok(())
}

fn replay_wal(path: &Path, cluster: &Cluster) -> anyhow::Result<usize> {
    let mut applied = 0usize;
    Wal::replay(path, |id, vector, meta| {
        match cluster.insert(&id, &vector, &meta) {
            Ok(()) => applied += 1,
            Err(err) => tracing::warn!(error = %err, id = %id, "wal replay insert skipped"),
        }
    })
    .context("replay wal")?;
    Ok(applied)
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sig = signal(SignalKind::terminate()).expect("failed to install signal handler");
        sig.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received ctrl-c, shutting down");
        },
        _ = terminate => {
            tracing::info!("received terminate signal, shutting down");
        },
    }

    // cancels in-flight training as well as the accept loop
    token.cancel();
}
