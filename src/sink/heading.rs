//! Heading-anchored insertion: notes become children of `## <heading>`.

use chrono::NaiveDate;
use futures_util::future::{BoxFuture, FutureExt};
use tracing::{error, info};

use super::{resolve_journal_page, NoteSink, WriteReport};
use crate::format::TaskFormatter;
use crate::host::{BlockId, InsertOpts, InsertTarget, NewBlock, NoteHost, PageRef};
use crate::models::task::Task;
use crate::{AppError, Result};

/// Inserts all notes in one batch under a top-level heading block,
/// creating the heading as the first block of the page when missing.
///
/// Descriptions travel as nested children of their task's block, so the
/// batch either lands whole or not at all.
#[derive(Debug, Clone)]
pub struct HeadingSink {
    heading: String,
}

impl HeadingSink {
    /// Sink anchored at `## {heading}`.
    #[must_use]
    pub fn new(heading: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
        }
    }

    /// Exact block text of the heading.
    #[must_use]
    pub fn heading_text(&self) -> String {
        format!("## {}", self.heading.trim())
    }

    async fn ensure_heading(&self, host: &dyn NoteHost, page: &PageRef) -> Result<BlockId> {
        let heading = self.heading_text();
        let blocks = host
            .page_blocks(page)
            .await
            .map_err(|err| AppError::AnchorResolution(format!("page {}: {err}", page.name)))?;

        if let Some(block) = blocks.into_iter().find(|b| b.content.trim() == heading) {
            return Ok(block.id);
        }

        let id = host
            .insert_block(
                &InsertTarget::Page(page.name.clone()),
                &heading,
                InsertOpts {
                    sibling: false,
                    before: true,
                },
            )
            .await
            .map_err(|err| AppError::AnchorResolution(format!("heading '{heading}': {err}")))?;
        info!(page = %page.name, heading = %heading, "created journal heading");
        Ok(id)
    }

    async fn write_batch(
        &self,
        host: &dyn NoteHost,
        today: NaiveDate,
        tasks: &[Task],
        formatter: &TaskFormatter,
    ) -> Result<WriteReport> {
        let page = resolve_journal_page(host, today).await?;
        let heading = self.ensure_heading(host, &page).await?;

        let blocks: Vec<NewBlock> = tasks
            .iter()
            .map(|task| NewBlock {
                content: formatter.format(task),
                children: task.description_text().map(NewBlock::leaf).into_iter().collect(),
            })
            .collect();

        match host.insert_batch(&heading, &blocks).await {
            Ok(ids) => {
                info!(heading = %heading, count = ids.len(), "inserted notes under heading");
                Ok(WriteReport {
                    written: tasks.to_vec(),
                    failed: 0,
                    description_failures: 0,
                })
            }
            Err(err) => {
                error!(heading = %heading, %err, count = tasks.len(), "batch insert failed");
                Ok(WriteReport {
                    written: Vec::new(),
                    failed: tasks.len(),
                    description_failures: 0,
                })
            }
        }
    }
}

impl NoteSink for HeadingSink {
    fn name(&self) -> &'static str {
        "heading"
    }

    fn write<'a>(
        &'a self,
        host: &'a dyn NoteHost,
        today: NaiveDate,
        tasks: &'a [Task],
        formatter: &'a TaskFormatter,
    ) -> BoxFuture<'a, Result<WriteReport>> {
        self.write_batch(host, today, tasks, formatter).boxed()
    }
}
