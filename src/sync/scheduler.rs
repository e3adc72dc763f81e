//! Repeating timer that drives sync cycles.
//!
//! The [`Scheduler`] owns at most one timer task. [`Scheduler::start`]
//! always cancels the previous timer first, so a reconfiguration can
//! never leave two timers running. The first tick fires immediately.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

use super::cycle::{CycleOutcome, SyncCycle, Trigger};

/// Handle to a running timer task.
struct ScheduleHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owner of the repeating sync timer.
#[derive(Default)]
pub struct Scheduler {
    handle: Option<ScheduleHandle>,
    cycle: Option<Arc<SyncCycle>>,
}

impl Scheduler {
    /// Create a stopped scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer for `cycle` at its configured interval.
    ///
    /// Any existing timer is stopped first. One cycle runs right away.
    /// Must be called within a Tokio runtime.
    pub fn start(&mut self, cycle: Arc<SyncCycle>) {
        let period = cycle.settings().interval();
        self.start_with_period(cycle, period);
    }

    /// Arm the timer with an explicit `period` instead of the configured interval.
    pub fn start_with_period(&mut self, cycle: Arc<SyncCycle>, period: Duration) {
        self.stop();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(
            run_timer(Arc::clone(&cycle), period, cancel.clone())
                .instrument(info_span!("sync_scheduler")),
        );
        info!(period_secs = period.as_secs(), "sync scheduler started");

        self.handle = Some(ScheduleHandle { cancel, task });
        self.cycle = Some(cycle);
    }

    /// Cancel the timer. Idempotent; a cycle already running completes.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.cancel.cancel();
            drop(handle.task);
            info!("sync scheduler stopped");
        }
    }

    /// Replace the running configuration: `stop` then `start`.
    pub fn restart(&mut self, cycle: Arc<SyncCycle>) {
        self.stop();
        self.start(cycle);
    }

    /// Whether a timer is armed.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.task.is_finished())
    }

    /// The cycle of the most recent `start`, kept after `stop` for manual syncs.
    #[must_use]
    pub fn current_cycle(&self) -> Option<Arc<SyncCycle>> {
        self.cycle.clone()
    }

    /// Run a cycle right now, independent of the timer.
    ///
    /// Returns [`CycleOutcome::Skipped`] when the scheduler was never started.
    pub async fn sync_now(&self) -> CycleOutcome {
        match self.current_cycle() {
            Some(cycle) => cycle.run(Trigger::Manual).await,
            None => CycleOutcome::Skipped,
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_timer(cycle: Arc<SyncCycle>, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("sync timer cancelled");
                break;
            }
            _ = interval.tick() => {
                let outcome = cycle.run(Trigger::Timer).await;
                debug!(outcome = outcome.kind(), "scheduled cycle finished");
            }
        }
    }
}
