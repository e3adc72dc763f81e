//! Unit tests for the file-backed graph host.

use std::time::Duration;

use chrono::NaiveDate;

use inbox_sync::host::graph::GraphHost;
use inbox_sync::host::{InsertOpts, InsertTarget, NewBlock, NoteHost, Severity};

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).expect("valid date")
}

fn host_with_page(text: &str) -> (tempfile::TempDir, GraphHost) {
    let temp = tempfile::tempdir().expect("tempdir");
    let journals = temp.path().join("journals");
    std::fs::create_dir_all(&journals).expect("mkdir");
    std::fs::write(journals.join("2026_10_16.md"), text).expect("write page");
    let host = GraphHost::new(temp.path());
    (temp, host)
}

fn read_page(temp: &tempfile::TempDir) -> String {
    std::fs::read_to_string(temp.path().join("journals").join("2026_10_16.md")).expect("read page")
}

#[tokio::test]
async fn missing_page_is_none_and_create_makes_it() {
    let temp = tempfile::tempdir().expect("tempdir");
    let host = GraphHost::new(temp.path());

    assert_eq!(host.get_page("2026-10-16").await.expect("lookup"), None);

    let page = host.create_journal_page(day()).await.expect("create");
    assert_eq!(page.name, "2026-10-16");
    assert!(page.is_journal_for(day()));
    assert!(host.get_page("2026-10-16").await.expect("lookup").is_some());
}

#[tokio::test]
async fn create_keeps_existing_content() {
    let (temp, host) = host_with_page("- existing\n");
    host.create_journal_page(day()).await.expect("create");
    assert_eq!(read_page(&temp), "- existing\n");
}

#[tokio::test]
async fn headless_graph_has_no_current_page() {
    let temp = tempfile::tempdir().expect("tempdir");
    let host = GraphHost::new(temp.path());
    assert_eq!(host.current_page().await.expect("current"), None);
}

#[tokio::test]
async fn page_blocks_exposes_nested_ids() {
    let (_temp, host) = host_with_page("- a\n\t- b\n- c\n");
    let page = host.get_page("2026-10-16").await.expect("lookup").expect("page");

    let blocks = host.page_blocks(&page).await.expect("blocks");
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].children[0].content, "b");
    assert_eq!(blocks[0].children[0].id.path, vec![0, 0]);
    assert_eq!(blocks[1].id.path, vec![1]);
}

#[tokio::test]
async fn insert_before_on_page_prepends() {
    let (temp, host) = host_with_page("- old\n");
    let target = InsertTarget::Page("2026-10-16".into());
    let opts = InsertOpts {
        sibling: false,
        before: true,
    };

    let id = host.insert_block(&target, "new", opts).await.expect("insert");
    assert_eq!(id.path, vec![0]);
    assert_eq!(read_page(&temp), "- new\n- old\n");
}

#[tokio::test]
async fn insert_relative_to_block_respects_flags() {
    let (temp, host) = host_with_page("- a\n\t- a1\n- b\n");
    let page = host.get_page("2026-10-16").await.expect("lookup").expect("page");
    let a = host.page_blocks(&page).await.expect("blocks")[0].id.clone();

    let last_child = InsertOpts {
        sibling: false,
        before: false,
    };
    host.insert_block(&InsertTarget::Block(a.clone()), "a2", last_child)
        .await
        .expect("child");

    let after = InsertOpts {
        sibling: true,
        before: false,
    };
    host.insert_block(&InsertTarget::Block(a), "between", after)
        .await
        .expect("sibling");

    assert_eq!(read_page(&temp), "- a\n\t- a1\n\t- a2\n- between\n- b\n");
}

#[tokio::test]
async fn insert_into_missing_block_fails() {
    let (_temp, host) = host_with_page("- a\n");
    let missing = inbox_sync::host::BlockId {
        page: "2026-10-16".into(),
        path: vec![4],
    };
    let result = host
        .insert_block(&InsertTarget::Block(missing), "x", InsertOpts::default())
        .await;
    assert!(matches!(result, Err(inbox_sync::AppError::Host(_))));
}

#[tokio::test]
async fn insert_batch_appends_children_in_order() {
    let (temp, host) = host_with_page("- ## Todoist Inbox\n\t- earlier\n");
    let page = host.get_page("2026-10-16").await.expect("lookup").expect("page");
    let heading = host.page_blocks(&page).await.expect("blocks")[0].id.clone();

    let blocks = vec![
        NewBlock {
            content: "A".into(),
            children: vec![NewBlock::leaf("details")],
        },
        NewBlock::leaf("B"),
    ];
    let ids = host.insert_batch(&heading, &blocks).await.expect("batch");

    assert_eq!(ids.len(), 2);
    assert_eq!(ids[0].path, vec![0, 1]);
    assert_eq!(ids[1].path, vec![0, 2]);
    assert_eq!(
        read_page(&temp),
        "- ## Todoist Inbox\n\t- earlier\n\t- A\n\t\t- details\n\t- B\n"
    );
}

#[test]
fn show_message_records_unexpired_message() {
    let host = GraphHost::new("/graph");
    host.show_message("hello", Severity::Success, Duration::from_secs(60));

    let msg = host.last_message().expect("message");
    assert_eq!(msg.text, "hello");
    assert_eq!(msg.severity, Severity::Success);

    host.show_message("gone", Severity::Info, Duration::ZERO);
    assert!(host.last_message().is_none());
}
