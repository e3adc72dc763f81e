#![forbid(unsafe_code)]

//! `inbox-sync` daemon binary.
//!
//! Loads configuration, opens the sync ledger, arms the sync scheduler,
//! and serves `inbox-sync-ctl` over local IPC until a shutdown signal.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use inbox_sync::app::AppState;
use inbox_sync::config::GlobalConfig;
use inbox_sync::config_watcher::ConfigWatcher;
use inbox_sync::host::graph::GraphHost;
use inbox_sync::ipc::server::spawn_ipc_server;
use inbox_sync::persistence::db;
use inbox_sync::persistence::ledger_repo::LedgerRepo;
use inbox_sync::sync::{CycleOutcome, SharedSyncState, SyncCycle, Trigger};
use inbox_sync::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "inbox-sync", about = "Todoist Inbox to journal sync daemon", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Run a single sync cycle and exit.
    #[arg(long)]
    once: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("inbox-sync bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let file_config = GlobalConfig::load_from_path(&args.config)?;
    let mut config = file_config.clone();
    config.load_credentials().await;
    info!(graph_dir = %config.graph_dir.display(), "configuration loaded");

    // ── Initialize ledger database ──────────────────────
    let db = Arc::new(db::connect(&config.db_path()).await?);
    info!(path = %config.db_path().display(), "ledger database connected");

    let host = Arc::new(GraphHost::new(config.graph_dir.clone()));
    let shared = SharedSyncState::new(host, LedgerRepo::new(db));

    if args.once {
        return run_once(&config, shared).await;
    }

    // ── Start scheduler and IPC ─────────────────────────
    let ct = CancellationToken::new();
    let ipc_name = config.ipc_name.clone();
    let state = AppState::start(config, shared)?;
    let ipc_handle = spawn_ipc_server(&ipc_name, Arc::clone(&state), ct.clone())?;

    let watcher = ConfigWatcher::new(&args.config, file_config)?;
    let mut config_rx = watcher.subscribe();

    info!("inbox-sync ready");

    // ── Serve until shutdown ────────────────────────────
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
            changed = config_rx.changed() => {
                if changed.is_err() {
                    warn!("config watcher closed; hot reload disabled");
                    shutdown.as_mut().await;
                    info!("shutdown signal received");
                    break;
                }
                let mut fresh = (**config_rx.borrow_and_update()).clone();
                fresh.load_credentials().await;
                if let Err(err) = state.reconfigure(fresh).await {
                    error!(%err, "failed to apply reloaded configuration");
                }
            }
        }
    }

    ct.cancel();
    state.shutdown().await;
    drop(watcher);

    if let Err(err) = ipc_handle.await {
        error!(%err, "ipc server task failed");
    }
    info!("inbox-sync shut down");

    Ok(())
}

/// Run one manual cycle and map its outcome to the process result.
async fn run_once(config: &GlobalConfig, shared: SharedSyncState) -> Result<()> {
    let cycle = SyncCycle::from_config(config, shared)?;
    let outcome = cycle.run(Trigger::Manual).await;
    info!(outcome = outcome.kind(), summary = %outcome.summary(), "single cycle finished");
    match outcome {
        CycleOutcome::Failed(err) => Err(err),
        _ => Ok(()),
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
