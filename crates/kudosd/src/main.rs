//! Kudos Daemon - reward generation and progression service

use anyhow::{Context, Result};
use clap::Parser;
use kudos_common::KudosConfig;
use kudosd::state::AppState;
use kudosd::{server, sweeper};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kudosd", version, about = "Kudos reward and progression daemon")]
struct Args {
    /// Config file (defaults to /etc/kudos/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = KudosConfig::load(args.config.as_deref()).context("loading config")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Kudos Daemon v{} starting", env!("CARGO_PKG_VERSION"));

    let addr: SocketAddr = match args.bind {
        Some(addr) => addr,
        None => config
            .server
            .bind_addr
            .parse()
            .with_context(|| format!("invalid bind_addr {}", config.server.bind_addr))?,
    };

    let state = Arc::new(AppState::from_config(&config)?);
    let sweeper = sweeper::spawn_sweeper(
        state.registry().clone(),
        Duration::from_secs(config.server.sweep_interval_secs.max(1)),
    );

    let served = server::run(state, addr).await;
    sweeper.abort();
    served
}
