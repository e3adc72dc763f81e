//! Shared application state and the user-facing commands.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::config::GlobalConfig;
use crate::host::Severity;
use crate::sync::cycle::SyncStatus;
use crate::sync::{CycleOutcome, Scheduler, SharedSyncState, SyncCycle};
use crate::Result;

/// Shared application state for the daemon and its IPC commands.
pub struct AppState {
    /// Active configuration, credentials included.
    pub config: RwLock<Arc<GlobalConfig>>,
    /// Repeating sync timer.
    pub scheduler: Mutex<Scheduler>,
    /// Host, ledger, and cycle guard shared across reconfigurations.
    pub shared: SharedSyncState,
}

/// Snapshot returned by the `status` command.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Whether the timer is armed.
    pub scheduler_running: bool,
    /// Whether a Todoist token is configured.
    pub credential_configured: bool,
    /// Deletion mode flag.
    pub delete_after_import: bool,
    /// Effective interval in minutes.
    pub interval_minutes: u64,
    /// Number of ids in the ledger.
    pub ledger_size: usize,
    /// Time of the last committed cycle.
    pub last_sync: Option<DateTime<Utc>>,
    /// Cycle phase and last outcome.
    pub cycle: SyncStatus,
}

impl AppState {
    /// Build the state and start the scheduler for `config`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the Todoist client cannot be built.
    pub fn start(config: GlobalConfig, shared: SharedSyncState) -> Result<Arc<Self>> {
        let cycle = Arc::new(SyncCycle::from_config(&config, shared.clone())?);
        let mut scheduler = Scheduler::new();
        scheduler.start(cycle);
        Ok(Arc::new(Self {
            config: RwLock::new(Arc::new(config)),
            scheduler: Mutex::new(scheduler),
            shared,
        }))
    }

    /// Swap in a new configuration and re-arm the timer.
    ///
    /// Edits to `graph_dir`, `state_dir` and `ipc_name` are logged and
    /// ignored; they need a daemon restart.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the Todoist client cannot be built;
    /// the previous configuration keeps running in that case.
    pub async fn reconfigure(&self, mut config: GlobalConfig) -> Result<()> {
        let running = Arc::clone(&*self.config.read().await);
        for field in config.keep_startup_fields(&running) {
            warn!(field, "config field changed; restart the daemon to apply it");
        }
        let cycle = Arc::new(SyncCycle::from_config(&config, self.shared.clone())?);
        self.scheduler.lock().await.restart(cycle);
        *self.config.write().await = Arc::new(config);
        info!("configuration applied; scheduler re-armed");
        Ok(())
    }

    /// Run a cycle now, outside the timer.
    pub async fn sync_now(&self) -> CycleOutcome {
        self.shared.host.show_message(
            "🔄 Starting synchronization...",
            Severity::Info,
            Duration::from_secs(5),
        );
        // Release the scheduler lock before the cycle runs.
        let cycle = self.scheduler.lock().await.current_cycle();
        match cycle {
            Some(cycle) => cycle.run(crate::sync::Trigger::Manual).await,
            None => CycleOutcome::Skipped,
        }
    }

    /// Forget every synced id and the last-sync time.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the ledger cannot be cleared.
    pub async fn reset_history(&self) -> Result<()> {
        match self.shared.ledger.reset_history().await {
            Ok(()) => {
                info!("sync history reset");
                self.shared.host.show_message(
                    "🔄 Sync history reset",
                    Severity::Success,
                    Duration::from_secs(5),
                );
                Ok(())
            }
            Err(err) => {
                error!(%err, "sync history reset failed");
                self.shared.host.show_message(
                    &format!("❌ Reset failed: {err}"),
                    Severity::Error,
                    Duration::from_secs(10),
                );
                Err(err)
            }
        }
    }

    /// Current scheduler, ledger, and cycle status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the ledger cannot be read.
    pub async fn status(&self) -> Result<StatusReport> {
        let config = Arc::clone(&*self.config.read().await);
        let state = self.shared.ledger.load().await?;
        let scheduler_running = self.scheduler.lock().await.is_running();
        Ok(StatusReport {
            scheduler_running,
            credential_configured: config.todoist.has_credential(),
            delete_after_import: config.sync.delete_after_import,
            interval_minutes: config.sync.interval_minutes.max(1),
            ledger_size: state.ledger.len(),
            last_sync: state.last_sync,
            cycle: self.shared.status(),
        })
    }

    /// Stop the timer; a running cycle finishes on its own.
    pub async fn shutdown(&self) {
        self.scheduler.lock().await.stop();
    }
}
