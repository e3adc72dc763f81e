//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
///
/// Partial write and partial delete failures are not errors: a cycle that
/// loses some tasks still completes, and the counts travel in
/// [`CycleReport`](crate::sync::cycle::CycleReport).
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// No Todoist credential is configured.
    ConfigurationMissing(String),
    /// Non-2xx response or network failure from the Todoist API.
    Transport {
        /// HTTP status, absent when the request never got a response.
        status: Option<u16>,
        /// Response body or transport error text.
        body: String,
    },
    /// Requested entity does not exist.
    NotFound(String),
    /// Today's journal page or heading could not be found or created.
    AnchorResolution(String),
    /// Note host operation failure (page read, block insert).
    Host(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
    /// IPC communication failure.
    Ipc(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// Build a transport error for a non-success HTTP status.
    #[must_use]
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Transport {
            status: Some(status),
            body: body.into(),
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::ConfigurationMissing(msg) => write!(f, "configuration missing: {msg}"),
            Self::Transport {
                status: Some(status),
                body,
            } => write!(f, "transport: HTTP {status}: {body}"),
            Self::Transport { status: None, body } => write!(f, "transport: {body}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::AnchorResolution(msg) => write!(f, "anchor resolution: {msg}"),
            Self::Host(msg) => write!(f, "host: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Ipc(msg) => write!(f, "ipc: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            status: err.status().map(|status| status.as_u16()),
            body: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
