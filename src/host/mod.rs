//! Note-taking host abstraction.
//!
//! [`NoteHost`] is the narrow surface the sync core needs from the
//! knowledge-base application: page lookup, block listing, block
//! insertion, journal page creation, and transient user messages. It is
//! injected into the cycle and the sinks, never reached as a global.
//!
//! [`graph::GraphHost`] implements it over an outliner graph on disk.

pub mod graph;
pub mod outline;

use std::fmt::{Display, Formatter};
use std::time::Duration;

use chrono::NaiveDate;
use futures_util::future::BoxFuture;
use serde::Serialize;

use crate::Result;

/// Page name used for the journal of `date` (`YYYY-MM-DD`).
#[must_use]
pub fn journal_page_name(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// A resolved page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRef {
    /// Page name; journal pages use [`journal_page_name`].
    pub name: String,
    /// Date of the journal entry, `None` for ordinary pages.
    pub journal_day: Option<NaiveDate>,
}

impl PageRef {
    /// Whether this page is the journal entry for `date`.
    #[must_use]
    pub fn is_journal_for(&self, date: NaiveDate) -> bool {
        self.journal_day == Some(date)
    }
}

/// Address of a block: its page plus the child-index path from the top level.
///
/// An id stays valid until the next structural edit that shifts its
/// siblings or ancestors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockId {
    /// Owning page name.
    pub page: String,
    /// Child indices, outermost first; never empty.
    pub path: Vec<usize>,
}

impl Display for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#", self.page)?;
        for (i, index) in self.path.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{index}")?;
        }
        Ok(())
    }
}

/// A block as read back from a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Address of this block.
    pub id: BlockId,
    /// Raw block text.
    pub content: String,
    /// Nested blocks.
    pub children: Vec<Block>,
}

/// A block to insert, possibly with nested children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBlock {
    /// Block text.
    pub content: String,
    /// Children inserted beneath it, in order.
    pub children: Vec<NewBlock>,
}

impl NewBlock {
    /// A leaf block.
    #[must_use]
    pub fn leaf(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            children: Vec::new(),
        }
    }
}

/// Where [`NoteHost::insert_block`] places a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertTarget {
    /// Top level of a page.
    Page(String),
    /// Relative to an existing block.
    Block(BlockId),
}

/// Positioning flags for [`NoteHost::insert_block`].
///
/// For a page target `sibling` is ignored and `before` means "first
/// top-level block". For a block target, `sibling: false` inserts a child
/// (first child when `before`, else last) and `sibling: true` inserts next
/// to the target (before or after it).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOpts {
    /// Insert next to the target instead of inside it.
    pub sibling: bool,
    /// Insert before instead of after.
    pub before: bool,
}

/// Severity of a transient user-facing message.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Neutral progress information.
    Info,
    /// A cycle or command completed.
    Success,
    /// Non-fatal problem.
    Warning,
    /// A cycle or command failed.
    Error,
}

/// Operations the sync core consumes from the note-taking application.
pub trait NoteHost: Send + Sync {
    /// Page currently focused by the user, if the host has such a notion.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Host`](crate::AppError::Host) on host failure.
    fn current_page(&self) -> BoxFuture<'_, Result<Option<PageRef>>>;

    /// Look up a page by name.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Host`](crate::AppError::Host) on host failure.
    fn get_page<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Option<PageRef>>>;

    /// Top-level blocks of a page, each with its nested children.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Host`](crate::AppError::Host) if the page cannot be read.
    fn page_blocks<'a>(&'a self, page: &'a PageRef) -> BoxFuture<'a, Result<Vec<Block>>>;

    /// Insert one block relative to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Host`](crate::AppError::Host) if the target does not exist or the write fails.
    fn insert_block<'a>(
        &'a self,
        target: &'a InsertTarget,
        content: &'a str,
        opts: InsertOpts,
    ) -> BoxFuture<'a, Result<BlockId>>;

    /// Append `blocks` as children of `parent`, preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Host`](crate::AppError::Host) if the parent does not exist or the write fails.
    fn insert_batch<'a>(
        &'a self,
        parent: &'a BlockId,
        blocks: &'a [NewBlock],
    ) -> BoxFuture<'a, Result<Vec<BlockId>>>;

    /// Create (or return the existing) journal page for `date`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Host`](crate::AppError::Host) if the page cannot be created.
    fn create_journal_page(&self, date: NaiveDate) -> BoxFuture<'_, Result<PageRef>>;

    /// Show a transient message to the user.
    fn show_message(&self, text: &str, severity: Severity, timeout: Duration);
}
