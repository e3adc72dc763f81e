//! Sync cycle orchestration and its scheduler.

pub mod cycle;
pub mod scheduler;

pub use cycle::{CycleOutcome, CyclePhase, CycleReport, SharedSyncState, SyncCycle, Trigger};
pub use scheduler::Scheduler;
