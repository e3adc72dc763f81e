//! Ledger repository for `SQLite` persistence.
//!
//! Stores the synced task ids and the `last_sync` timestamp. A cycle
//! commits both in one transaction so a crash can never leave a ledger
//! that disagrees with its timestamp.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::ledger::Ledger;
use crate::models::sync_state::SyncState;
use crate::{AppError, Result};

use super::db::Database;

const LAST_SYNC_KEY: &str = "last_sync";

/// Repository for the deduplication ledger.
#[derive(Clone)]
pub struct LedgerRepo {
    db: Arc<Database>,
}

impl LedgerRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Load the persisted ledger and last-sync timestamp.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if a query fails or the stored timestamp is malformed.
    pub async fn load(&self) -> Result<SyncState> {
        let ids: Vec<(String,)> = sqlx::query_as("SELECT task_id FROM synced_task")
            .fetch_all(self.db.as_ref())
            .await?;

        let last_sync: Option<(String,)> =
            sqlx::query_as("SELECT value FROM sync_meta WHERE key = ?1")
                .bind(LAST_SYNC_KEY)
                .fetch_optional(self.db.as_ref())
                .await?;

        let last_sync = last_sync
            .map(|(raw,)| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|ts| ts.with_timezone(&Utc))
                    .map_err(|e| AppError::Db(format!("invalid last_sync: {e}")))
            })
            .transpose()?;

        Ok(SyncState {
            ledger: Ledger::from_ids(ids.into_iter().map(|(id,)| id)),
            last_sync,
        })
    }

    /// Replace the stored ledger with `ledger` and record `last_sync`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the transaction fails; nothing is written then.
    pub async fn commit(&self, ledger: &Ledger, last_sync: DateTime<Utc>) -> Result<()> {
        let stamp = last_sync.to_rfc3339();
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM synced_task")
            .execute(&mut *tx)
            .await?;
        for id in ledger.iter() {
            sqlx::query("INSERT INTO synced_task (task_id, synced_at) VALUES (?1, ?2)")
                .bind(id)
                .bind(&stamp)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query(
            "INSERT INTO sync_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(LAST_SYNC_KEY)
        .bind(&stamp)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Forget every synced id and the last-sync timestamp.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the transaction fails.
    pub async fn reset_history(&self) -> Result<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM synced_task")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM sync_meta WHERE key = ?1")
            .bind(LAST_SYNC_KEY)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
