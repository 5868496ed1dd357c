mod resolve;

use std::net::IpAddr;

/// Process configuration. Every option resolves CLI flag first, then
/// environment variable, then the default. `dim` and `num_shards` are
/// immutable once the cluster is built.
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub bind_addr: IpAddr,
    pub data_dir: String,
    pub dim: usize,
    pub num_shards: usize,
    pub page_bytes: usize,
    pub ivf_clusters: usize,
    pub ivf_iterations: usize,
    pub ivf_auto_tune: bool,
    pub max_k: usize,
    pub default_k: usize,
    pub wal_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: "127.0.0.1".parse().unwrap(),
            data_dir: "data".to_string(),
            dim: 128,
            num_shards: 3,
            page_bytes: 4 * 1024 * 1024,
            ivf_clusters: 2000,
            ivf_iterations: 10,
            ivf_auto_tune: true,
            max_k: 256,
            default_k: 5,
            wal_enabled: false,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Config::default();
        let bind_addr = resolve::resolve_string("--bind-addr", "BIND_ADDR", "127.0.0.1")
            .parse()
            .map_err(|err| anyhow::anyhow!("invalid BIND_ADDR: {err}"))?;

        let config = Self {
            port: resolve::resolve_u64("--port", "PORT", defaults.port as u64) as u16,
            bind_addr,
            data_dir: resolve::resolve_string("--data-dir", "DATA_DIR", &defaults.data_dir),
            dim: resolve::resolve_usize("--dim", "DIM", defaults.dim),
            num_shards: resolve::resolve_usize("--num-shards", "NUM_SHARDS", defaults.num_shards),
            page_bytes: resolve::resolve_usize("--page-bytes", "PAGE_BYTES", defaults.page_bytes),
            ivf_clusters: resolve::resolve_usize(
                "--ivf-clusters",
                "IVF_CLUSTERS",
                defaults.ivf_clusters,
            ),
            ivf_iterations: resolve::resolve_usize(
                "--ivf-iterations",
                "IVF_ITERATIONS",
                defaults.ivf_iterations,
            ),
            ivf_auto_tune: resolve::resolve_bool(
                "--ivf-auto-tune",
                "IVF_AUTO_TUNE",
                defaults.ivf_auto_tune,
            ),
            max_k: resolve::resolve_usize("--max-k", "MAX_K", defaults.max_k),
            default_k: defaults.default_k,
            wal_enabled: resolve::resolve_bool("--wal-enabled", "WAL_ENABLED", false),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.dim > 0, "DIM must be positive");
        anyhow::ensure!(self.num_shards > 0, "NUM_SHARDS must be positive");
        anyhow::ensure!(self.ivf_iterations > 0, "IVF_ITERATIONS must be positive");
        anyhow::ensure!(
            self.page_bytes >= self.dim * 4,
            "PAGE_BYTES must hold at least one vector"
        );
        Ok(())
    }
}
