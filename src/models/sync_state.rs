//! Persisted synchronization state.

use chrono::{DateTime, Utc};

use crate::ledger::Ledger;

/// Ledger of synced task ids plus the time of the last committed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    /// Task ids already materialized as notes.
    pub ledger: Ledger,
    /// When the last cycle committed, if ever.
    pub last_sync: Option<DateTime<Utc>>,
}
