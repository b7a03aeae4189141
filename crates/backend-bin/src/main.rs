// ============================
// backend-bin/src/main.rs
// ============================
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use backend_lib::{config::Settings, create_router, storage::FlatFileStorage, AppState};
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Admissions admin backend
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// TOML config file (defaults to ./config.toml when present)
    #[arg(short, long, env = "DINGFENG_CONFIG")]
    config: Option<PathBuf>,
    /// Override the bind address
    #[arg(long)]
    bind: Option<SocketAddr>,
    /// Keep data and backups under this directory
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Serve the public site from this directory
    #[arg(long)]
    static_dir: Option<PathBuf>,
    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Settings::load().context("loading config")?,
    };
    if let Some(bind) = cli.bind {
        settings.bind_addr = bind;
    }
    if let Some(dir) = cli.data_dir {
        settings = settings.with_data_root(dir);
    }
    if let Some(dir) = cli.static_dir {
        settings.static_dir = Some(dir);
    }

    init_tracing(&settings.log_level, cli.json_logs);

    let storage = FlatFileStorage::new(&settings.storage.data_dir)
        .with_context(|| format!("opening data dir {}", settings.storage.data_dir.display()))?;
    let state = Arc::new(AppState::new(storage, &settings)?);
    let tasks = state.spawn_background_tasks();

    let app = create_router(Arc::clone(&state));
    let listener = TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("binding {}", settings.bind_addr))?;
    tracing::info!(
        addr = %settings.bind_addr,
        data_dir = %settings.storage.data_dir.display(),
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for task in tasks {
        task.abort();
    }
    tracing::info!("server stopped");
    Ok(())
}
