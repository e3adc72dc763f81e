//! Integration tests for `TodoistClient` against a local fake API.
//!
//! The fake binds an ephemeral port on 127.0.0.1 and records the
//! authorization header and request paths it sees.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde_json::json;

use inbox_sync::config::TodoistConfig;
use inbox_sync::todoist::{TaskSource, TodoistClient};
use inbox_sync::AppError;

#[derive(Clone, Default)]
struct FakeApi {
    inbox_flagged: bool,
    tasks_status: Option<u16>,
    seen: Arc<Mutex<Vec<String>>>,
    auth: Arc<Mutex<Option<String>>>,
    content_type: Arc<Mutex<Option<String>>>,
}

impl FakeApi {
    fn record(&self, headers: &HeaderMap, what: String) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        *self.auth.lock().unwrap() = header("authorization");
        *self.content_type.lock().unwrap() = header("content-type");
        self.seen.lock().unwrap().push(what);
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

async fn projects(State(api): State<FakeApi>, headers: HeaderMap) -> Json<serde_json::Value> {
    api.record(&headers, "GET projects".into());
    Json(json!([
        { "id": "100", "name": "Work", "is_inbox_project": false },
        { "id": "220", "name": "Inbox", "is_inbox_project": api.inbox_flagged },
    ]))
}

async fn tasks(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let project = query.get("project_id").cloned().unwrap_or_default();
    api.record(&headers, format!("GET tasks project_id={project}"));
    if let Some(code) = api.tasks_status {
        let status = StatusCode::from_u16(code).unwrap();
        return (status, "Forbidden").into_response();
    }
    Json(json!([
        {
            "id": "1",
            "content": "Buy milk",
            "description": "",
            "project_id": project,
            "labels": ["home"],
            "priority": 1,
            "due": { "string": "today", "date": "2026-10-16", "is_recurring": false },
            "url": "https://todoist.com/showTask?id=1",
            "is_completed": false
        },
        { "id": "2", "content": "Call Bob", "project_id": project }
    ]))
    .into_response()
}

async fn remove(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> StatusCode {
    api.record(&headers, format!("DELETE tasks/{id}"));
    if id == "missing" {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::NO_CONTENT
    }
}

/// Serve `api` on an ephemeral port and return its REST base URL.
async fn spawn_api(api: FakeApi) -> String {
    let app = Router::new()
        .route("/rest/v2/projects", get(projects))
        .route("/rest/v2/tasks", get(tasks))
        .route("/rest/v2/tasks/{id}", delete(remove))
        .with_state(api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}/rest/v2")
}

fn client(base: &str) -> TodoistClient {
    TodoistClient::new(&TodoistConfig {
        api_token: "secret-token".into(),
        api_base: base.to_owned(),
        ..TodoistConfig::default()
    })
    .expect("client")
}

fn flagged() -> FakeApi {
    FakeApi {
        inbox_flagged: true,
        ..FakeApi::default()
    }
}

#[test]
fn client_requires_a_token() {
    let result = TodoistClient::new(&TodoistConfig::default());
    assert!(matches!(result, Err(AppError::ConfigurationMissing(_))));
}

#[test]
fn client_rejects_non_base_url() {
    let result = TodoistClient::new(&TodoistConfig {
        api_token: "t".into(),
        api_base: "mailto:someone@example.com".into(),
        ..TodoistConfig::default()
    });
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[tokio::test]
async fn discovers_inbox_then_lists_its_tasks() {
    let api = flagged();
    let base = spawn_api(api.clone()).await;

    let tasks = client(&base).inbox_tasks(None).await.expect("tasks");

    assert_eq!(
        api.seen(),
        vec!["GET projects".to_owned(), "GET tasks project_id=220".to_owned()]
    );
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].content, "Buy milk");
    assert_eq!(tasks[0].labels, vec!["home".to_owned()]);
    assert_eq!(
        tasks[0].due.as_ref().and_then(|d| d.display()),
        Some("today")
    );
    assert_eq!(tasks[1].due, None);
}

#[tokio::test]
async fn explicit_project_id_skips_discovery() {
    let api = flagged();
    let base = spawn_api(api.clone()).await;

    client(&base).inbox_tasks(Some("777")).await.expect("tasks");

    assert_eq!(api.seen(), vec!["GET tasks project_id=777".to_owned()]);
}

#[tokio::test]
async fn every_request_carries_the_bearer_token() {
    let api = flagged();
    let base = spawn_api(api.clone()).await;
    let client = client(&base);

    client.inbox_project_id().await.expect("project");
    assert_eq!(
        api.auth.lock().unwrap().as_deref(),
        Some("Bearer secret-token")
    );
    assert_eq!(
        api.content_type.lock().unwrap().as_deref(),
        Some("application/json")
    );

    client.delete_task("42").await.expect("delete");
    assert_eq!(
        api.auth.lock().unwrap().as_deref(),
        Some("Bearer secret-token")
    );
    assert_eq!(
        api.content_type.lock().unwrap().as_deref(),
        Some("application/json")
    );
}

#[tokio::test]
async fn missing_inbox_flag_is_not_found() {
    let base = spawn_api(FakeApi::default()).await;

    let result = client(&base).inbox_project_id().await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn non_success_status_carries_code_and_body() {
    let api = FakeApi {
        tasks_status: Some(403),
        ..flagged()
    };
    let base = spawn_api(api).await;

    let result = client(&base).inbox_tasks(Some("220")).await;

    match result {
        Err(AppError::Transport { status, body }) => {
            assert_eq!(status, Some(403));
            assert_eq!(body, "Forbidden");
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn delete_hits_task_path() {
    let api = flagged();
    let base = spawn_api(api.clone()).await;
    let client = client(&base);

    client.delete_task("42").await.expect("delete");
    let missing = client.delete_task("missing").await;

    assert!(matches!(
        missing,
        Err(AppError::Transport {
            status: Some(404),
            ..
        })
    ));
    assert_eq!(
        api.seen(),
        vec!["DELETE tasks/42".to_owned(), "DELETE tasks/missing".to_owned()]
    );
}

#[tokio::test]
async fn unreachable_server_is_transport_error_without_status() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let result = client(&format!("http://{addr}/rest/v2"))
        .list_inbox_tasks(Some("220"))
        .await;

    assert!(matches!(
        result,
        Err(AppError::Transport { status: None, .. })
    ));
}
