//! Top-of-day insertion: notes become the first blocks of today's page.

use chrono::NaiveDate;
use futures_util::future::{BoxFuture, FutureExt};
use tracing::{info, warn};

use super::{resolve_journal_page, NoteSink, WriteReport};
use crate::format::TaskFormatter;
use crate::host::{InsertOpts, InsertTarget, NoteHost};
use crate::models::task::Task;
use crate::Result;

/// Prepends one block per task to today's page.
///
/// The host primitive prepends, so tasks are inserted last-to-first and
/// the first input task ends up first on the page. A description is
/// attached as a child of its task's block; failing to attach it is
/// counted but keeps the parent block.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopOfDaySink;

impl TopOfDaySink {
    async fn write_each(
        host: &dyn NoteHost,
        today: NaiveDate,
        tasks: &[Task],
        formatter: &TaskFormatter,
    ) -> Result<WriteReport> {
        let page = resolve_journal_page(host, today).await?;
        let target = InsertTarget::Page(page.name.clone());
        let prepend = InsertOpts {
            sibling: false,
            before: true,
        };

        let mut report = WriteReport::default();
        for task in tasks.iter().rev() {
            let text = formatter.format(task);
            let id = match host.insert_block(&target, &text, prepend).await {
                Ok(id) => id,
                Err(err) => {
                    warn!(task_id = %task.id, %err, "failed to insert task block");
                    report.failed += 1;
                    continue;
                }
            };

            if let Some(description) = task.description_text() {
                let child = InsertOpts {
                    sibling: false,
                    before: false,
                };
                if let Err(err) = host
                    .insert_block(&InsertTarget::Block(id), description, child)
                    .await
                {
                    warn!(task_id = %task.id, %err, "failed to attach task description");
                    report.description_failures += 1;
                }
            }
            report.written.push(task.clone());
        }

        // Collected last-to-first; restore input order.
        report.written.reverse();
        info!(
            page = %page.name,
            written = report.written.len(),
            failed = report.failed,
            "prepended notes to journal page"
        );
        Ok(report)
    }
}

impl NoteSink for TopOfDaySink {
    fn name(&self) -> &'static str {
        "top_of_day"
    }

    fn write<'a>(
        &'a self,
        host: &'a dyn NoteHost,
        today: NaiveDate,
        tasks: &'a [Task],
        formatter: &'a TaskFormatter,
    ) -> BoxFuture<'a, Result<WriteReport>> {
        Self::write_each(host, today, tasks, formatter).boxed()
    }
}
