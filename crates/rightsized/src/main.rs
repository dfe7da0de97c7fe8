//! rightsized — the rightsize daemon.
//!
//! Single binary that assembles:
//! - State store (redb)
//! - Platform backend (in-memory, seeded from config)
//! - Gauge registry
//! - Reconciler + per-scaler scheduler
//! - REST API + Prometheus endpoint
//!
//! # Usage
//!
//! ```text
//! rightsized run --config /etc/rightsize.toml --port 8480 --data-dir /var/lib/rightsize
//! rightsized check-config /etc/rightsize.toml
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};

use rightsize_api::ApiState;
use rightsize_controller::{Collaborators, ReconcileSettings, Reconciler, ScalerScheduler};
use rightsize_core::RightsizeConfig;
use rightsize_metrics::GaugeRegistry;
use rightsize_platform::InMemoryPlatform;
use rightsize_state::StateStore;

#[derive(Parser)]
#[command(name = "rightsized", about = "Backlog-driven reserved concurrency controller")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the controller and its API.
    Run {
        /// TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides `[server].port`).
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for persistent state (overrides `[server].data_dir`).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Parse and validate a config file, then exit.
    CheckConfig {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Command::Run {
            config,
            port,
            data_dir,
        } => {
            let config = match config {
                Some(path) => load_config(&path)?,
                None => RightsizeConfig::default(),
            };
            let port = port.unwrap_or_else(|| config.port());
            let data_dir = data_dir.unwrap_or_else(|| PathBuf::from(config.data_dir()));
            run(config, port, data_dir).await
        }
        Command::CheckConfig { file } => {
            let config = load_config(&file)?;
            println!(
                "{}: ok ({} scalers, {} functions, {} queues)",
                file.display(),
                config.scalers.len(),
                config.platform.functions.len(),
                config.platform.queues.len()
            );
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,rightsized=debug,rightsize=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: &Path) -> anyhow::Result<RightsizeConfig> {
    let config = RightsizeConfig::from_file(path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}

async fn run(config: RightsizeConfig, port: u16, data_dir: PathBuf) -> anyhow::Result<()> {
    info!("rightsize daemon starting");
    config.validate()?;

    let settings = ReconcileSettings::from_config(&config.controller)?;
    let discovery_interval = config.controller.discovery_interval()?;

    // ── Initialize subsystems ──────────────────────────────────

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;
    let db_path = data_dir.join("rightsize.redb");
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    for entry in &config.scalers {
        let record = store.put_scaler(&entry.to_record())?;
        info!(key = %record.table_key(), "scaler seeded from config");
    }

    let platform = InMemoryPlatform::from_config(&config.platform);
    let gauges = GaugeRegistry::new();

    let collab = Collaborators {
        store: Arc::new(store.clone()),
        verifier: Arc::new(platform.clone()),
        sampler: Arc::new(platform.clone()),
        applier: Arc::new(platform),
        gauges: Arc::new(gauges.clone()),
    };
    info!(
        requeue_secs = settings.requeue_interval.as_secs(),
        cooldown_secs = settings.cooldown.as_secs(),
        call_timeout_ms = settings.call_timeout.as_millis() as u64,
        "reconciler initialized"
    );
    let reconciler = Arc::new(Reconciler::new(collab, settings));
    let scheduler = ScalerScheduler::new(Arc::clone(&reconciler));

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(discovery_interval, shutdown_rx).await;
    });

    // ── Start API server ───────────────────────────────────────

    let router = rightsize_api::build_router(ApiState {
        store,
        gauges,
        reconciler,
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    if let Err(e) = scheduler_handle.await {
        error!(error = %e, "scaler scheduler task failed");
    }

    info!("rightsize daemon stopped");
    Ok(())
}
