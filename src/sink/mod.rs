//! Note sinks: strategies that place formatted tasks into today's journal.
//!
//! Every strategy tolerates partial success. A task whose insertion fails
//! is counted in [`WriteReport::failed`] and the remaining tasks are still
//! written. Only a failure to resolve the journal anchor aborts a write.

pub mod heading;
pub mod top_of_day;

use chrono::NaiveDate;
use futures_util::future::{BoxFuture, FutureExt};
use tracing::{debug, warn};

use crate::config::{SinkStrategy, SyncSettings};
use crate::format::TaskFormatter;
use crate::host::{journal_page_name, NoteHost, PageRef};
use crate::models::task::Task;
use crate::{AppError, Result};

pub use heading::HeadingSink;
pub use top_of_day::TopOfDaySink;

/// Result of writing a batch of tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Tasks that made it into the journal, in input order.
    pub written: Vec<Task>,
    /// Tasks whose block could not be inserted.
    pub failed: usize,
    /// Descriptions that could not be attached to an inserted block.
    pub description_failures: usize,
}

/// A strategy for inserting task notes into the journal.
pub trait NoteSink: Send + Sync {
    /// Short strategy name used in logs.
    fn name(&self) -> &'static str;

    /// Write `tasks` into the journal page for `today`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::AnchorResolution`] if today's page (or the
    /// strategy's anchor inside it) cannot be found or created. Per-task
    /// failures are reported in the [`WriteReport`] instead.
    fn write<'a>(
        &'a self,
        host: &'a dyn NoteHost,
        today: NaiveDate,
        tasks: &'a [Task],
        formatter: &'a TaskFormatter,
    ) -> BoxFuture<'a, Result<WriteReport>>;
}

/// Resolve or create the journal page for `today`.
///
/// The focused page wins when it is today's journal; otherwise the page is
/// looked up by name and created when missing.
///
/// # Errors
///
/// Returns [`AppError::AnchorResolution`] if every step fails.
pub async fn resolve_journal_page(host: &dyn NoteHost, today: NaiveDate) -> Result<PageRef> {
    match host.current_page().await {
        Ok(Some(page)) if page.is_journal_for(today) => return Ok(page),
        Ok(_) => {}
        Err(err) => debug!(%err, "current page unavailable"),
    }

    let name = journal_page_name(today);
    match host.get_page(&name).await {
        Ok(Some(page)) => return Ok(page),
        Ok(None) => {}
        Err(err) => warn!(%err, page = %name, "journal page lookup failed; creating"),
    }

    host.create_journal_page(today)
        .await
        .map_err(|err| AppError::AnchorResolution(format!("journal page {name}: {err}")))
}

/// Ordered list of strategies; the first one that writes anything wins.
///
/// When every strategy fails, the last attempt's result is returned.
pub struct FallbackSink {
    strategies: Vec<Box<dyn NoteSink>>,
}

impl FallbackSink {
    /// Chain `strategies` in the given order.
    #[must_use]
    pub fn new(strategies: Vec<Box<dyn NoteSink>>) -> Self {
        Self { strategies }
    }

    /// Build the chain configured in `settings`.
    #[must_use]
    pub fn from_settings(settings: &SyncSettings) -> Self {
        let strategies = settings
            .strategies
            .iter()
            .map(|strategy| -> Box<dyn NoteSink> {
                match strategy {
                    SinkStrategy::Heading => {
                        Box::new(HeadingSink::new(settings.journal_heading.clone()))
                    }
                    SinkStrategy::TopOfDay => Box::new(TopOfDaySink),
                }
            })
            .collect();
        Self::new(strategies)
    }

    async fn write_chain(
        &self,
        host: &dyn NoteHost,
        today: NaiveDate,
        tasks: &[Task],
        formatter: &TaskFormatter,
    ) -> Result<WriteReport> {
        let mut last = None;
        for strategy in &self.strategies {
            match strategy.write(host, today, tasks, formatter).await {
                Ok(report) if report.written.is_empty() && report.failed > 0 => {
                    warn!(
                        strategy = strategy.name(),
                        failed = report.failed,
                        "note sink strategy wrote nothing"
                    );
                    last = Some(Ok(report));
                }
                Ok(report) => return Ok(report),
                Err(err) => {
                    warn!(strategy = strategy.name(), %err, "note sink strategy failed");
                    last = Some(Err(err));
                }
            }
        }
        last.unwrap_or_else(|| {
            Err(AppError::AnchorResolution(
                "no sink strategy configured".into(),
            ))
        })
    }
}

impl NoteSink for FallbackSink {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn write<'a>(
        &'a self,
        host: &'a dyn NoteHost,
        today: NaiveDate,
        tasks: &'a [Task],
        formatter: &'a TaskFormatter,
    ) -> BoxFuture<'a, Result<WriteReport>> {
        self.write_chain(host, today, tasks, formatter).boxed()
    }
}
