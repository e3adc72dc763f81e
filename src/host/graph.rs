//! File-backed [`NoteHost`] over an outliner graph directory.
//!
//! Journal pages live in `<graph>/journals/YYYY_MM_DD.md`, other pages in
//! `<graph>/pages/<name>.md`. Every mutation re-reads the page, edits the
//! parsed [`Outline`], and replaces the file through a temp-file rename,
//! so a concurrently running editor never sees a half-written page.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use futures_util::future::{BoxFuture, FutureExt};
use serde::Serialize;
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{debug, error, info, warn};

use super::outline::{Node, Outline};
use super::{
    journal_page_name, Block, BlockId, InsertOpts, InsertTarget, NewBlock, NoteHost, PageRef,
    Severity,
};
use crate::{AppError, Result};

/// Last message shown through [`NoteHost::show_message`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HostMessage {
    /// Message text.
    pub text: String,
    /// Severity level.
    pub severity: Severity,
    /// When the message stops being relevant.
    pub expires_at: DateTime<Utc>,
}

/// Outliner graph rooted at a directory.
pub struct GraphHost {
    root: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
    last_message: Mutex<Option<HostMessage>>,
}

impl GraphHost {
    /// Create a host for the graph at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: tokio::sync::Mutex::new(()),
            last_message: Mutex::new(None),
        }
    }

    /// Graph root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The most recent message that has not yet expired.
    #[must_use]
    pub fn last_message(&self) -> Option<HostMessage> {
        let guard = self
            .last_message
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard
            .as_ref()
            .filter(|msg| msg.expires_at > Utc::now())
            .cloned()
    }

    /// File backing the page called `name`.
    #[must_use]
    pub fn page_path(&self, name: &str) -> PathBuf {
        match parse_journal_name(name) {
            Some(day) => self
                .root
                .join("journals")
                .join(format!("{}.md", day.format("%Y_%m_%d"))),
            None => self.root.join("pages").join(format!("{}.md", sanitize(name))),
        }
    }

    async fn read_outline(&self, name: &str) -> Result<Outline> {
        let path = self.page_path(name);
        let text = fs::read_to_string(&path)
            .await
            .map_err(|err| AppError::Host(format!("cannot read page '{name}': {err}")))?;
        Ok(Outline::parse(&text))
    }

    async fn write_outline(&self, name: &str, outline: &Outline) -> Result<()> {
        let path = self.page_path(name);
        let text = outline.render();
        let page = name.to_owned();
        tokio::task::spawn_blocking(move || replace_file(&path, text.as_bytes()))
            .await
            .map_err(|err| AppError::Host(format!("page write task for '{page}' failed: {err}")))?
    }

    async fn page_ref(&self, name: &str) -> Result<Option<PageRef>> {
        let exists = fs::try_exists(self.page_path(name))
            .await
            .map_err(|err| AppError::Host(format!("cannot stat page '{name}': {err}")))?;
        Ok(exists.then(|| PageRef {
            name: name.to_owned(),
            journal_day: parse_journal_name(name),
        }))
    }

    async fn blocks(&self, page: &PageRef) -> Result<Vec<Block>> {
        let outline = self.read_outline(&page.name).await?;
        Ok(outline
            .blocks
            .iter()
            .enumerate()
            .map(|(index, node)| to_block(&page.name, vec![index], node))
            .collect())
    }

    async fn insert(&self, target: &InsertTarget, content: &str, opts: InsertOpts) -> Result<BlockId> {
        let _guard = self.write_lock.lock().await;
        let page = match target {
            InsertTarget::Page(name) => name,
            InsertTarget::Block(id) => &id.page,
        };
        let mut outline = self.read_outline(page).await?;

        let (parent, index) = match target {
            InsertTarget::Page(_) => (Vec::new(), if opts.before { 0 } else { usize::MAX }),
            InsertTarget::Block(id) => {
                if outline.node(&id.path).is_none() {
                    return Err(AppError::Host(format!("block {id} not found")));
                }
                if opts.sibling {
                    let (own, parent) = id
                        .path
                        .split_last()
                        .ok_or_else(|| AppError::Host(format!("block {id} has an empty path")))?;
                    (parent.to_vec(), if opts.before { *own } else { own + 1 })
                } else {
                    (id.path.clone(), if opts.before { 0 } else { usize::MAX })
                }
            }
        };

        let path = outline
            .insert(&parent, index, Node::leaf(content))
            .ok_or_else(|| AppError::Host(format!("cannot insert into page '{page}'")))?;
        self.write_outline(page, &outline).await?;

        let id = BlockId {
            page: page.clone(),
            path,
        };
        debug!(block = %id, "inserted block");
        Ok(id)
    }

    async fn insert_many(&self, parent: &BlockId, blocks: &[NewBlock]) -> Result<Vec<BlockId>> {
        let _guard = self.write_lock.lock().await;
        let mut outline = self.read_outline(&parent.page).await?;

        let mut ids = Vec::with_capacity(blocks.len());
        for block in blocks {
            let path = outline
                .insert(&parent.path, usize::MAX, Node::from(block))
                .ok_or_else(|| AppError::Host(format!("block {parent} not found")))?;
            ids.push(BlockId {
                page: parent.page.clone(),
                path,
            });
        }
        self.write_outline(&parent.page, &outline).await?;
        debug!(parent = %parent, count = ids.len(), "inserted block batch");
        Ok(ids)
    }

    async fn create_journal(&self, date: NaiveDate) -> Result<PageRef> {
        let _guard = self.write_lock.lock().await;
        let name = journal_page_name(date);
        let path = self.page_path(&name);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .await
                .map_err(|err| AppError::Host(format!("cannot create journals dir: {err}")))?;
        }
        if create_if_missing(&path).await? {
            info!(page = %name, "created journal page");
        }
        Ok(PageRef {
            name,
            journal_day: Some(date),
        })
    }
}

impl NoteHost for GraphHost {
    fn current_page(&self) -> BoxFuture<'_, Result<Option<PageRef>>> {
        // A headless graph has no focused page.
        async { Ok(None) }.boxed()
    }

    fn get_page<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Option<PageRef>>> {
        self.page_ref(name).boxed()
    }

    fn page_blocks<'a>(&'a self, page: &'a PageRef) -> BoxFuture<'a, Result<Vec<Block>>> {
        self.blocks(page).boxed()
    }

    fn insert_block<'a>(
        &'a self,
        target: &'a InsertTarget,
        content: &'a str,
        opts: InsertOpts,
    ) -> BoxFuture<'a, Result<BlockId>> {
        self.insert(target, content, opts).boxed()
    }

    fn insert_batch<'a>(
        &'a self,
        parent: &'a BlockId,
        blocks: &'a [NewBlock],
    ) -> BoxFuture<'a, Result<Vec<BlockId>>> {
        self.insert_many(parent, blocks).boxed()
    }

    fn create_journal_page(&self, date: NaiveDate) -> BoxFuture<'_, Result<PageRef>> {
        self.create_journal(date).boxed()
    }

    fn show_message(&self, text: &str, severity: Severity, timeout: Duration) {
        match severity {
            Severity::Info | Severity::Success => info!(?severity, "{text}"),
            Severity::Warning => warn!("{text}"),
            Severity::Error => error!("{text}"),
        }
        let expires_at = Utc::now()
            + chrono::Duration::from_std(timeout).unwrap_or_else(|_| chrono::Duration::zero());
        let mut guard = self
            .last_message
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = Some(HostMessage {
            text: text.to_owned(),
            severity,
            expires_at,
        });
    }
}

/// Create an empty file at `path` unless something already exists there.
///
/// Returns `true` when the file was created. A failed existence check is an
/// error, never a reason to write.
async fn create_if_missing(path: &Path) -> Result<bool> {
    let exists = fs::try_exists(path)
        .await
        .map_err(|err| AppError::Host(format!("cannot stat page {}: {err}", path.display())))?;
    if exists {
        return Ok(false);
    }
    fs::write(path, "")
        .await
        .map_err(|err| AppError::Host(format!("cannot create page {}: {err}", path.display())))?;
    Ok(true)
}

/// Write `bytes` to a temp file next to `path`, then atomically rename it over `path`.
fn replace_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| AppError::Host(format!("page path {} has no parent", path.display())))?;
    let mut tmp = NamedTempFile::new_in(parent)
        .map_err(|err| AppError::Host(format!("failed to create temporary file: {err}")))?;
    tmp.write_all(bytes)
        .map_err(|err| AppError::Host(format!("failed to write temporary file: {err}")))?;
    tmp.persist(path).map_err(|err| {
        AppError::Host(format!("failed to persist page to {}: {err}", path.display()))
    })?;
    Ok(())
}

fn to_block(page: &str, path: Vec<usize>, node: &Node) -> Block {
    let children = node
        .children
        .iter()
        .enumerate()
        .map(|(index, child)| {
            let mut child_path = path.clone();
            child_path.push(index);
            to_block(page, child_path, child)
        })
        .collect();
    Block {
        id: BlockId {
            page: page.to_owned(),
            path,
        },
        content: node.content.clone(),
        children,
    }
}

fn parse_journal_name(name: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(name, "%Y-%m-%d").ok()
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect()
}
