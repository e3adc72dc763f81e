//! Local IPC server for `inbox-sync-ctl` commands.
//!
//! Listens on a named pipe (Windows) or Unix domain socket (Linux/macOS)
//! using the `interprocess` crate. Accepts line-delimited JSON commands
//! and routes them to [`AppState`].
//!
//! ## Protocol
//!
//! Request (one JSON object per line):
//! ```json
//! {"command": "sync"}
//! {"command": "reset"}
//! {"command": "status"}
//! ```
//!
//! Response (one JSON object per line):
//! ```json
//! {"ok": true, "data": { ... } }
//! {"ok": false, "error": "unknown command: foo"}
//! ```

use std::sync::Arc;

use interprocess::local_socket::{tokio::prelude::*, GenericNamespaced, ListenerOptions};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::app::AppState;
use crate::sync::CycleOutcome;
use crate::{AppError, Result};

/// Inbound IPC request from `inbox-sync-ctl`.
#[derive(Debug, Deserialize)]
pub struct IpcRequest {
    /// Command verb.
    pub command: String,
}

/// Outbound IPC response to `inbox-sync-ctl`.
#[derive(Debug, Serialize)]
pub struct IpcResponse {
    /// Whether the command succeeded.
    pub ok: bool,
    /// Payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Error message on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IpcResponse {
    fn success(data: serde_json::Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }

    fn encoded<T: Serialize>(payload: &T) -> Self {
        match serde_json::to_value(payload) {
            Ok(data) => Self::success(data),
            Err(err) => Self::error(format!("failed to encode response: {err}")),
        }
    }

    /// Single-line JSON encoding followed by `\n`.
    #[must_use]
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"ok":false,"error":"serialization failed"}"#.to_owned());
        line.push('\n');
        line
    }
}

/// Spawn the IPC server task on socket `name`.
///
/// # Errors
///
/// Returns `AppError::Ipc` if the listener cannot be created.
pub fn spawn_ipc_server(
    name: &str,
    state: Arc<AppState>,
    ct: CancellationToken,
) -> Result<tokio::task::JoinHandle<()>> {
    let name = name.to_owned();
    let listener_name = name
        .clone()
        .to_ns_name::<GenericNamespaced>()
        .map_err(|err| AppError::Ipc(format!("invalid ipc socket name '{name}': {err}")))?;

    let listener = ListenerOptions::new()
        .name(listener_name)
        .create_tokio()
        .map_err(|err| AppError::Ipc(format!("failed to create ipc listener: {err}")))?;

    info!(ipc_name = %name, "IPC server listening");

    let accept_loop = async move {
        loop {
            let stream = tokio::select! {
                biased;
                () = ct.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok(stream) => stream,
                    Err(err) => {
                        warn!(%err, "IPC accept failed");
                        continue;
                    }
                },
            };
            tokio::spawn(
                handle_connection(stream, Arc::clone(&state)).instrument(info_span!("ipc_conn")),
            );
        }
        info!("IPC server stopped");
    };

    Ok(tokio::spawn(
        accept_loop.instrument(info_span!("ipc_server", ipc_name = %name)),
    ))
}

/// Serve one client until it disconnects.
async fn handle_connection(
    stream: interprocess::local_socket::tokio::Stream,
    state: Arc<AppState>,
) {
    let (reader, mut writer) = stream.split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!(%err, "ipc read error");
                break;
            }
        };
        let Some(reply) = answer_line(&line, &state).await else {
            continue;
        };
        if let Err(err) = writer.write_all(reply.as_bytes()).await {
            warn!(%err, "failed to write ipc response");
            break;
        }
    }

    debug!("ipc client disconnected");
}

/// Answer one request line with a newline-terminated response line.
///
/// Blank lines get no answer.
pub async fn answer_line(line: &str, state: &AppState) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let response = match serde_json::from_str::<IpcRequest>(trimmed) {
        Ok(request) => dispatch_command(&request, state).await,
        Err(err) => IpcResponse::error(format!("invalid json: {err}")),
    };
    Some(response.to_line())
}

/// Route an IPC command to the matching [`AppState`] operation.
pub async fn dispatch_command(request: &IpcRequest, state: &AppState) -> IpcResponse {
    let span = info_span!("ipc_command", command = %request.command);
    async move {
        match request.command.as_str() {
            "sync" => handle_sync(state).await,
            "reset" => match state.reset_history().await {
                Ok(()) => IpcResponse::success(serde_json::json!({ "reset": true })),
                Err(err) => IpcResponse::error(format!("failed to reset history: {err}")),
            },
            "status" => match state.status().await {
                Ok(report) => IpcResponse::encoded(&report),
                Err(err) => IpcResponse::error(format!("failed to read status: {err}")),
            },
            other => IpcResponse::error(format!("unknown command: {other}")),
        }
    }
    .instrument(span)
    .await
}

/// Run a manual cycle and report its outcome.
async fn handle_sync(state: &AppState) -> IpcResponse {
    let outcome = state.sync_now().await;
    let summary = outcome.summary();
    match outcome {
        CycleOutcome::Failed(err) => IpcResponse::error(format!("sync failed: {err}")),
        CycleOutcome::Completed(report) => IpcResponse::success(serde_json::json!({
            "outcome": "completed",
            "summary": summary,
            "report": report,
        })),
        other => IpcResponse::success(serde_json::json!({
            "outcome": other.kind(),
            "summary": summary,
        })),
    }
}
