//! Deduplication ledger: the set of task ids already written as notes.
//!
//! The functions here are pure. Persistence lives in
//! [`LedgerRepo`](crate::persistence::ledger_repo::LedgerRepo); the
//! sync cycle reads the ledger at cycle start and commits it at the end.
//! Ids are never removed one at a time, only by a whole-set [`reset`].

use std::collections::BTreeSet;

use crate::models::task::Task;

/// Set of synced task identifiers. Order is irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger(BTreeSet<String>);

impl Ledger {
    /// Build a ledger from any collection of ids.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(ids.into_iter().map(Into::into).collect())
    }

    /// Whether `id` has already been synced.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    /// Number of recorded ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no ids are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate recorded ids in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Tasks whose ids are absent from `known`, in input order.
#[must_use]
pub fn filter_unsynced(tasks: &[Task], known: &Ledger) -> Vec<Task> {
    tasks
        .iter()
        .filter(|task| !known.contains(&task.id))
        .cloned()
        .collect()
}

/// Union of `known` and `new_ids`.
#[must_use]
pub fn record_synced<I, S>(known: &Ledger, new_ids: I) -> Ledger
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut updated = known.clone();
    updated.0.extend(new_ids.into_iter().map(Into::into));
    updated
}

/// The empty ledger, used after a deletion cycle or a user-requested reset.
#[must_use]
pub fn reset() -> Ledger {
    Ledger::default()
}
