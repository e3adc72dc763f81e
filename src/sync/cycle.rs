//! One synchronization cycle: fetch → filter → write → delete or persist.
//!
//! A cycle never propagates an error. Every outcome is logged, shown to
//! the user through [`NoteHost::show_message`], and returned as a
//! [`CycleOutcome`]. The single-flight guard in [`SharedSyncState`] keeps
//! two cycles from interleaving their ledger read-modify-write.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{GlobalConfig, SyncSettings};
use crate::format::TaskFormatter;
use crate::host::{NoteHost, Severity};
use crate::ledger::{self, Ledger};
use crate::persistence::ledger_repo::LedgerRepo;
use crate::sink::{FallbackSink, NoteSink, WriteReport};
use crate::todoist::{TaskSource, TodoistClient};
use crate::{AppError, Result};

/// Cycle state machine phases.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    /// No cycle running.
    #[default]
    Idle,
    /// Listing Inbox tasks.
    Fetching,
    /// Removing already-synced tasks.
    Filtering,
    /// Inserting notes.
    Writing,
    /// Deleting written tasks from Todoist.
    Deleting,
    /// Committing the ledger.
    Persisting,
    /// The cycle hit an error; returns to `Idle` right after.
    Failed,
}

/// What started a cycle.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Scheduler tick (including the eager first tick).
    Timer,
    /// `sync now` command.
    Manual,
}

/// Counts from a cycle that reached its post-write step.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CycleReport {
    /// Tasks listed in the Inbox.
    pub fetched: usize,
    /// Ids of tasks written as notes.
    pub written: Vec<String>,
    /// Tasks whose note could not be inserted.
    pub write_failures: usize,
    /// Descriptions that could not be attached.
    pub description_failures: usize,
    /// Whether the cycle ran in delete-after-import mode.
    pub deletion_mode: bool,
    /// Remote deletions that succeeded.
    pub deleted: usize,
    /// Remote deletions that were rejected.
    pub delete_failures: usize,
}

impl CycleReport {
    /// Every note insertion failed.
    #[must_use]
    pub fn nothing_landed(&self) -> bool {
        self.written.is_empty() && self.write_failures > 0
    }
}

/// Result of one invocation.
#[derive(Debug)]
pub enum CycleOutcome {
    /// No credential configured; nothing was attempted.
    Skipped,
    /// Another cycle held the single-flight guard.
    AlreadyRunning,
    /// The working set was empty; nothing was written or persisted.
    NothingToDo {
        /// Tasks listed in the Inbox.
        fetched: usize,
    },
    /// Notes were written (possibly partially) and the ledger committed.
    Completed(CycleReport),
    /// Fetch, anchor resolution, or ledger commit failed.
    Failed(AppError),
}

impl CycleOutcome {
    /// Stable machine-readable name.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::AlreadyRunning => "already_running",
            Self::NothingToDo { .. } => "nothing_to_do",
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
        }
    }

    /// One-line human summary.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Skipped => "Todoist API token not set. Configure it to enable sync.".into(),
            Self::AlreadyRunning => "A sync is already in progress.".into(),
            Self::NothingToDo { .. } => "📥 No new tasks in Todoist Inbox".into(),
            Self::Completed(report) if report.nothing_landed() => format!(
                "⚠️ No tasks could be added to the journal ({} failed)",
                report.write_failures
            ),
            Self::Completed(report) if report.deletion_mode => format!(
                "✅ Synced and deleted {} tasks from Todoist",
                report.written.len()
            ),
            Self::Completed(report) => {
                format!("✅ Synced {} new tasks (not deleted)", report.written.len())
            }
            Self::Failed(err) => format!("Sync error: {err}"),
        }
    }

    fn severity(&self) -> (Severity, Duration) {
        match self {
            Self::Skipped => (Severity::Warning, Duration::from_secs(8)),
            Self::AlreadyRunning | Self::NothingToDo { .. } => {
                (Severity::Info, Duration::from_secs(5))
            }
            Self::Completed(report) if report.nothing_landed() => {
                (Severity::Warning, Duration::from_secs(8))
            }
            Self::Completed(_) => (Severity::Success, Duration::from_secs(8)),
            Self::Failed(_) => (Severity::Error, Duration::from_secs(12)),
        }
    }
}

/// Observable cycle status for the `status` command.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStatus {
    /// Current phase.
    pub phase: CyclePhase,
    /// Kind of the last finished cycle.
    pub last_outcome: Option<String>,
    /// Summary of the last finished cycle.
    pub last_summary: Option<String>,
    /// When the last cycle finished.
    pub last_finished_at: Option<DateTime<Utc>>,
}

/// State shared by every cycle regardless of configuration.
#[derive(Clone)]
pub struct SharedSyncState {
    /// Note host the cycles write into.
    pub host: Arc<dyn NoteHost>,
    /// Persisted ledger.
    pub ledger: LedgerRepo,
    flight: Arc<Mutex<()>>,
    status: Arc<RwLock<SyncStatus>>,
}

impl SharedSyncState {
    /// Bundle a host and ledger with a fresh single-flight guard.
    #[must_use]
    pub fn new(host: Arc<dyn NoteHost>, ledger: LedgerRepo) -> Self {
        Self {
            host,
            ledger,
            flight: Arc::new(Mutex::new(())),
            status: Arc::new(RwLock::new(SyncStatus::default())),
        }
    }

    /// Snapshot of the current status.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.status
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn set_phase(&self, phase: CyclePhase) {
        let mut guard = self
            .status
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.phase = phase;
    }

    fn finish(&self, outcome: &CycleOutcome) {
        let mut guard = self
            .status
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.phase = CyclePhase::Idle;
        guard.last_outcome = Some(outcome.kind().to_owned());
        guard.last_summary = Some(outcome.summary());
        guard.last_finished_at = Some(Utc::now());
    }
}

/// A cycle bound to one configuration snapshot.
pub struct SyncCycle {
    settings: SyncSettings,
    inbox_project_id: Option<String>,
    source: Option<Arc<dyn TaskSource>>,
    sink: Box<dyn NoteSink>,
    formatter: TaskFormatter,
    shared: SharedSyncState,
}

impl SyncCycle {
    /// Assemble a cycle from explicit parts.
    ///
    /// `source` is `None` when no credential is configured; such a cycle
    /// always ends as [`CycleOutcome::Skipped`].
    #[must_use]
    pub fn new(
        settings: SyncSettings,
        inbox_project_id: Option<String>,
        source: Option<Arc<dyn TaskSource>>,
        sink: Box<dyn NoteSink>,
        shared: SharedSyncState,
    ) -> Self {
        Self {
            formatter: TaskFormatter::new(settings.format),
            settings,
            inbox_project_id,
            source,
            sink,
            shared,
        }
    }

    /// Build the production cycle for `config`: Todoist client plus the
    /// configured sink chain.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the Todoist client cannot be built.
    pub fn from_config(config: &GlobalConfig, shared: SharedSyncState) -> Result<Self> {
        let source: Option<Arc<dyn TaskSource>> = if config.todoist.has_credential() {
            Some(Arc::new(TodoistClient::new(&config.todoist)?))
        } else {
            None
        };
        Ok(Self::new(
            config.sync.clone(),
            config.todoist.inbox_project_id.clone(),
            source,
            Box::new(FallbackSink::from_settings(&config.sync)),
            shared,
        ))
    }

    /// Settings this cycle runs with.
    #[must_use]
    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Shared state behind this cycle.
    #[must_use]
    pub fn shared(&self) -> &SharedSyncState {
        &self.shared
    }

    /// Run one cycle for today's local date.
    pub async fn run(&self, trigger: Trigger) -> CycleOutcome {
        self.run_for(trigger, Local::now().date_naive()).await
    }

    /// Run one cycle writing into the journal page for `today`.
    pub async fn run_for(&self, trigger: Trigger, today: NaiveDate) -> CycleOutcome {
        let Ok(_flight) = self.shared.flight.try_lock() else {
            info!(?trigger, "sync already in progress; skipping");
            let outcome = CycleOutcome::AlreadyRunning;
            self.notify(&outcome);
            return outcome;
        };

        let cycle_id = Uuid::new_v4();
        let span = info_span!("sync_cycle", %cycle_id, ?trigger);
        let outcome = self.execute(today).instrument(span).await;

        if let CycleOutcome::Failed(ref err) = outcome {
            self.shared.set_phase(CyclePhase::Failed);
            warn!(%cycle_id, %err, "sync cycle failed");
        }
        self.shared.finish(&outcome);
        self.notify(&outcome);
        outcome
    }

    async fn execute(&self, today: NaiveDate) -> CycleOutcome {
        let Some(source) = self.source.as_deref() else {
            warn!("todoist token not set; cycle skipped");
            return CycleOutcome::Skipped;
        };
        match self.sync(source, today).await {
            Ok(outcome) => outcome,
            Err(err) => CycleOutcome::Failed(err),
        }
    }

    async fn sync(&self, source: &dyn TaskSource, today: NaiveDate) -> Result<CycleOutcome> {
        info!("starting synchronization");

        self.shared.set_phase(CyclePhase::Fetching);
        let tasks = source
            .list_inbox_tasks(self.inbox_project_id.as_deref())
            .await?;
        info!(count = tasks.len(), "found tasks in inbox");

        self.shared.set_phase(CyclePhase::Filtering);
        let deletion_mode = self.settings.delete_after_import;
        let (known, working) = if deletion_mode {
            // Remote deletion prevents reprocessing; the ledger is irrelevant.
            (Ledger::default(), tasks.clone())
        } else {
            let state = self.shared.ledger.load().await?;
            let working = ledger::filter_unsynced(&tasks, &state.ledger);
            (state.ledger, working)
        };

        if working.is_empty() {
            info!(fetched = tasks.len(), "all tasks already synced");
            return Ok(CycleOutcome::NothingToDo {
                fetched: tasks.len(),
            });
        }
        info!(count = working.len(), "new tasks to sync");

        self.shared.set_phase(CyclePhase::Writing);
        let written = self
            .sink
            .write(self.shared.host.as_ref(), today, &working, &self.formatter)
            .await?;
        self.report_partial_write(&written);

        let mut report = CycleReport {
            fetched: tasks.len(),
            written: written.written.iter().map(|t| t.id.clone()).collect(),
            write_failures: written.failed,
            description_failures: written.description_failures,
            deletion_mode,
            ..CycleReport::default()
        };

        let now = Utc::now();
        if deletion_mode {
            self.shared.set_phase(CyclePhase::Deleting);
            let (deleted, failed) = delete_all(source, &report.written).await;
            report.deleted = deleted;
            report.delete_failures = failed;
            if failed > 0 {
                self.shared.host.show_message(
                    &format!("⚠️ {failed} tasks could not be deleted from Todoist"),
                    Severity::Warning,
                    Duration::from_secs(8),
                );
            }
            // Remote state is authoritative after a deletion attempt.
            self.shared.ledger.commit(&ledger::reset(), now).await?;
        } else {
            self.shared.set_phase(CyclePhase::Persisting);
            let updated = ledger::record_synced(&known, report.written.iter().cloned());
            self.shared.ledger.commit(&updated, now).await?;
            info!(ledger_size = updated.len(), "saved synced ids");
        }

        Ok(CycleOutcome::Completed(report))
    }

    fn report_partial_write(&self, written: &WriteReport) {
        if written.failed > 0 {
            warn!(failed = written.failed, "some notes could not be written");
            self.shared.host.show_message(
                &format!("⚠️ {} tasks could not be added to the journal", written.failed),
                Severity::Warning,
                Duration::from_secs(8),
            );
        }
        if written.description_failures > 0 {
            warn!(
                failed = written.description_failures,
                "some descriptions could not be attached"
            );
        }
    }

    fn notify(&self, outcome: &CycleOutcome) {
        let (severity, timeout) = outcome.severity();
        self.shared
            .host
            .show_message(&outcome.summary(), severity, timeout);
    }
}

/// Delete every id concurrently; returns `(succeeded, failed)`.
async fn delete_all(source: &dyn TaskSource, ids: &[String]) -> (usize, usize) {
    let results = join_all(ids.iter().map(|id| source.delete_task(id))).await;
    let mut failed = 0;
    for (id, result) in ids.iter().zip(&results) {
        if let Err(err) = result {
            warn!(task_id = %id, %err, "failed to delete todoist task");
            failed += 1;
        }
    }
    (results.len() - failed, failed)
}
