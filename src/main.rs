use tracing::info;
use vexel::config::Config;

mod cli;
mod server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    info!("starting vexel v{}", env!("CARGO_PKG_VERSION"));

    let command = cli::parse_command()?;

    match command {
        cli::Command::Serve => {
            let config = Config::from_env()?;
            server::run(config).await?;
        }
        cli::Command::Route { id, shards } => {
            println!("{}", vexel::store::cluster::shard_for(&id, shards));
        }
    }

    Ok(())
}
