//! Shared fakes for cycle, sink, and scheduler integration tests.
//!
//! [`FakeSource`] stands in for the Todoist API and [`FakeHost`] for the
//! outliner. Both record every call and accept injected failures so tests
//! can assert on side effects without a network or a graph on disk.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use futures_util::future::{ready, BoxFuture, FutureExt};
use tokio::sync::Notify;

use inbox_sync::config::{SinkStrategy, SyncSettings};
use inbox_sync::host::outline::{Node, Outline};
use inbox_sync::host::{
    journal_page_name, Block, BlockId, InsertOpts, InsertTarget, NewBlock, NoteHost, PageRef,
    Severity,
};
use inbox_sync::models::task::Task;
use inbox_sync::persistence::{db, ledger_repo::LedgerRepo};
use inbox_sync::sink::FallbackSink;
use inbox_sync::sync::{SharedSyncState, SyncCycle};
use inbox_sync::todoist::TaskSource;
use inbox_sync::{AppError, Result};

/// Date every test cycle writes into.
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).expect("valid date")
}

/// Journal page name for [`today`].
pub fn today_page() -> String {
    journal_page_name(today())
}

/// Task with an id and title.
pub fn task(id: &str, content: &str) -> Task {
    Task::new(id, content)
}

// ── FakeSource ───────────────────────────────────────────────

/// In-memory Todoist Inbox.
#[derive(Default)]
pub struct FakeSource {
    tasks: Mutex<Vec<Task>>,
    fail_list: AtomicBool,
    failing_deletes: Mutex<HashSet<String>>,
    deleted: Mutex<Vec<String>>,
    list_calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl FakeSource {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            ..Self::default()
        }
    }

    /// Every list call waits for `gate` to be notified before answering.
    pub fn gated(tasks: Vec<Task>, gate: Arc<Notify>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn set_tasks(&self, tasks: Vec<Task>) {
        *self.tasks.lock().unwrap() = tasks;
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, id: &str) {
        self.failing_deletes.lock().unwrap().insert(id.to_owned());
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> Vec<String> {
        self.tasks
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.id.clone())
            .collect()
    }
}

impl TaskSource for FakeSource {
    fn list_inbox_tasks<'a>(
        &'a self,
        _project_id: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Vec<Task>>> {
        async move {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail_list.load(Ordering::SeqCst) {
                return Err(AppError::http(503, "Service Unavailable"));
            }
            Ok(self.tasks.lock().unwrap().clone())
        }
        .boxed()
    }

    fn delete_task<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>> {
        let result = if self.failing_deletes.lock().unwrap().contains(id) {
            Err(AppError::http(404, "Task not found"))
        } else {
            self.tasks.lock().unwrap().retain(|t| t.id != id);
            self.deleted.lock().unwrap().push(id.to_owned());
            Ok(())
        };
        ready(result).boxed()
    }
}

// ── FakeHost ─────────────────────────────────────────────────

/// In-memory outliner with failure injection and message capture.
#[derive(Default)]
pub struct FakeHost {
    pages: Mutex<BTreeMap<String, Outline>>,
    current: Mutex<Option<PageRef>>,
    failing_contents: Mutex<HashSet<String>>,
    fail_page_blocks: AtomicBool,
    fail_batch: AtomicBool,
    fail_create: AtomicBool,
    messages: Mutex<Vec<(String, Severity)>>,
    get_page_calls: AtomicUsize,
    insert_calls: AtomicUsize,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a page from outliner text.
    pub fn with_page(name: &str, text: &str) -> Self {
        let host = Self::default();
        host.pages
            .lock()
            .unwrap()
            .insert(name.to_owned(), Outline::parse(text));
        host
    }

    pub fn set_current(&self, page: Option<PageRef>) {
        *self.current.lock().unwrap() = page;
    }

    /// `insert_block` fails for blocks whose text contains `needle`.
    pub fn fail_insert_containing(&self, needle: &str) {
        self.failing_contents
            .lock()
            .unwrap()
            .insert(needle.to_owned());
    }

    pub fn clear_insert_failures(&self) {
        self.failing_contents.lock().unwrap().clear();
    }

    pub fn fail_page_blocks(&self, fail: bool) {
        self.fail_page_blocks.store(fail, Ordering::SeqCst);
    }

    pub fn fail_batch(&self, fail: bool) {
        self.fail_batch.store(fail, Ordering::SeqCst);
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Rendered page text, `None` when the page does not exist.
    pub fn page_text(&self, name: &str) -> Option<String> {
        self.pages.lock().unwrap().get(name).map(Outline::render)
    }

    /// Top-level block texts of a page.
    pub fn top_level(&self, name: &str) -> Vec<String> {
        self.pages
            .lock()
            .unwrap()
            .get(name)
            .map(|o| o.blocks.iter().map(|b| b.content.clone()).collect())
            .unwrap_or_default()
    }

    /// Child texts of the top-level block with text `parent`.
    pub fn children_of(&self, name: &str, parent: &str) -> Vec<String> {
        self.pages
            .lock()
            .unwrap()
            .get(name)
            .and_then(|o| o.blocks.iter().find(|b| b.content == parent).cloned())
            .map(|b| b.children.into_iter().map(|c| c.content).collect())
            .unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<(String, Severity)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn last_message(&self) -> Option<(String, Severity)> {
        self.messages.lock().unwrap().last().cloned()
    }

    pub fn get_page_calls(&self) -> usize {
        self.get_page_calls.load(Ordering::SeqCst)
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    fn lookup(&self, name: &str) -> Option<PageRef> {
        self.pages.lock().unwrap().contains_key(name).then(|| PageRef {
            name: name.to_owned(),
            journal_day: NaiveDate::parse_from_str(name, "%Y-%m-%d").ok(),
        })
    }

    fn blocks(&self, page: &PageRef) -> Result<Vec<Block>> {
        if self.fail_page_blocks.load(Ordering::SeqCst) {
            return Err(AppError::Host("page_blocks unavailable".into()));
        }
        let pages = self.pages.lock().unwrap();
        let outline = pages
            .get(&page.name)
            .ok_or_else(|| AppError::Host(format!("no page {}", page.name)))?;
        Ok(outline
            .blocks
            .iter()
            .enumerate()
            .map(|(i, node)| to_block(&page.name, vec![i], node))
            .collect())
    }

    fn insert(&self, target: &InsertTarget, content: &str, opts: InsertOpts) -> Result<BlockId> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .failing_contents
            .lock()
            .unwrap()
            .iter()
            .any(|needle| content.contains(needle.as_str()))
        {
            return Err(AppError::Host(format!("insert rejected: {content}")));
        }

        let page = match target {
            InsertTarget::Page(name) => name.clone(),
            InsertTarget::Block(id) => id.page.clone(),
        };
        let mut pages = self.pages.lock().unwrap();
        let outline = pages
            .get_mut(&page)
            .ok_or_else(|| AppError::Host(format!("no page {page}")))?;

        let (parent, index) = match target {
            InsertTarget::Page(_) => (Vec::new(), if opts.before { 0 } else { usize::MAX }),
            InsertTarget::Block(id) => {
                if outline.node(&id.path).is_none() {
                    return Err(AppError::Host(format!("no block {id}")));
                }
                if opts.sibling {
                    let (own, parent) = id.path.split_last().expect("non-empty path");
                    (parent.to_vec(), if opts.before { *own } else { own + 1 })
                } else {
                    (id.path.clone(), if opts.before { 0 } else { usize::MAX })
                }
            }
        };
        let path = outline
            .insert(&parent, index, Node::leaf(content))
            .ok_or_else(|| AppError::Host("insert failed".into()))?;
        Ok(BlockId { page, path })
    }

    fn batch(&self, parent: &BlockId, blocks: &[NewBlock]) -> Result<Vec<BlockId>> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_batch.load(Ordering::SeqCst) {
            return Err(AppError::Host("batch rejected".into()));
        }
        let mut pages = self.pages.lock().unwrap();
        let outline = pages
            .get_mut(&parent.page)
            .ok_or_else(|| AppError::Host(format!("no page {}", parent.page)))?;
        blocks
            .iter()
            .map(|block| {
                outline
                    .insert(&parent.path, usize::MAX, Node::from(block))
                    .map(|path| BlockId {
                        page: parent.page.clone(),
                        path,
                    })
                    .ok_or_else(|| AppError::Host(format!("no block {parent}")))
            })
            .collect()
    }

    fn create(&self, date: NaiveDate) -> Result<PageRef> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(AppError::Host("cannot create page".into()));
        }
        let name = journal_page_name(date);
        self.pages.lock().unwrap().entry(name.clone()).or_default();
        Ok(PageRef {
            name,
            journal_day: Some(date),
        })
    }
}

fn to_block(page: &str, path: Vec<usize>, node: &Node) -> Block {
    let children = node
        .children
        .iter()
        .enumerate()
        .map(|(i, child)| {
            let mut child_path = path.clone();
            child_path.push(i);
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

impl NoteHost for FakeHost {
    fn current_page(&self) -> BoxFuture<'_, Result<Option<PageRef>>> {
        ready(Ok(self.current.lock().unwrap().clone())).boxed()
    }

    fn get_page<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Option<PageRef>>> {
        self.get_page_calls.fetch_add(1, Ordering::SeqCst);
        ready(Ok(self.lookup(name))).boxed()
    }

    fn page_blocks<'a>(&'a self, page: &'a PageRef) -> BoxFuture<'a, Result<Vec<Block>>> {
        ready(self.blocks(page)).boxed()
    }

    fn insert_block<'a>(
        &'a self,
        target: &'a InsertTarget,
        content: &'a str,
        opts: InsertOpts,
    ) -> BoxFuture<'a, Result<BlockId>> {
        ready(self.insert(target, content, opts)).boxed()
    }

    fn insert_batch<'a>(
        &'a self,
        parent: &'a BlockId,
        blocks: &'a [NewBlock],
    ) -> BoxFuture<'a, Result<Vec<BlockId>>> {
        ready(self.batch(parent, blocks)).boxed()
    }

    fn create_journal_page(&self, date: NaiveDate) -> BoxFuture<'_, Result<PageRef>> {
        ready(self.create(date)).boxed()
    }

    fn show_message(&self, text: &str, severity: Severity, _timeout: Duration) {
        self.messages
            .lock()
            .unwrap()
            .push((text.to_owned(), severity));
    }
}

// ── Wiring ───────────────────────────────────────────────────

/// Shared state over `host` with an in-memory ledger.
pub async fn shared_state(host: Arc<FakeHost>) -> SharedSyncState {
    let db = db::connect_memory().await.expect("db");
    SharedSyncState::new(host, LedgerRepo::new(Arc::new(db)))
}

/// Settings with the given strategies and deletion flag.
pub fn settings(strategies: Vec<SinkStrategy>, delete_after_import: bool) -> SyncSettings {
    SyncSettings {
        strategies,
        delete_after_import,
        ..SyncSettings::default()
    }
}

/// Cycle over `source` and `shared` using `settings`.
pub fn cycle(
    settings: SyncSettings,
    source: Option<Arc<FakeSource>>,
    shared: SharedSyncState,
) -> SyncCycle {
    let sink = Box::new(FallbackSink::from_settings(&settings));
    let source = source.map(|s| s as Arc<dyn TaskSource>);
    SyncCycle::new(settings, None, source, sink, shared)
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, check: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
