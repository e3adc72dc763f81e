//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::{AppError, Result};

const KEYRING_SERVICE: &str = "inbox-sync";

/// Todoist connectivity settings.
///
/// When `api_token` is empty the token is loaded at runtime from the OS
/// keychain or the `TODOIST_API_TOKEN` environment variable.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TodoistConfig {
    /// Personal API token; empty means "not configured".
    #[serde(default)]
    pub api_token: String,
    /// Explicit Inbox project id; auto-discovered when absent.
    #[serde(default)]
    pub inbox_project_id: Option<String>,
    /// REST API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Per-request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for TodoistConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            inbox_project_id: None,
            api_base: default_api_base(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl TodoistConfig {
    /// Whether a credential is available.
    #[must_use]
    pub fn has_credential(&self) -> bool {
        !self.api_token.trim().is_empty()
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

fn default_api_base() -> String {
    "https://api.todoist.com/rest/v2".into()
}

fn default_request_timeout() -> u64 {
    30
}

/// Note insertion strategy.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SinkStrategy {
    /// Children of a `## <heading>` block on today's page.
    Heading,
    /// Top-level blocks at the start of today's page.
    TopOfDay,
}

/// How much task metadata ends up in the note text.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FormatStyle {
    /// Title, due, labels, priority, and URL.
    #[default]
    Full,
    /// Title, due, and labels only.
    Basic,
}

/// Behaviour of the synchronization cycle and its scheduler.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SyncSettings {
    /// Delete tasks from Todoist once they are written to the journal.
    #[serde(default)]
    pub delete_after_import: bool,
    /// Polling interval; values below one are treated as one.
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    /// Heading text used by the heading strategy (without `## `).
    #[serde(default = "default_journal_heading")]
    pub journal_heading: String,
    /// Insertion strategies, tried in order until one resolves its anchor.
    #[serde(default = "default_strategies")]
    pub strategies: Vec<SinkStrategy>,
    /// Note text style.
    #[serde(default)]
    pub format: FormatStyle,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            delete_after_import: false,
            interval_minutes: default_interval_minutes(),
            journal_heading: default_journal_heading(),
            strategies: default_strategies(),
            format: FormatStyle::default(),
        }
    }
}

impl SyncSettings {
    /// Effective polling interval, never shorter than one minute.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.max(1) * 60)
    }
}

fn default_interval_minutes() -> u64 {
    5
}

fn default_journal_heading() -> String {
    "Todoist Inbox".into()
}

fn default_strategies() -> Vec<SinkStrategy> {
    vec![SinkStrategy::Heading]
}

fn default_ipc_name() -> String {
    "inbox-sync".into()
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Root directory of the outliner graph (contains `journals/`).
    pub graph_dir: PathBuf,
    /// Directory for the sync ledger database; defaults to `<graph_dir>/.inbox-sync`.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    /// Named pipe / Unix socket identifier for `inbox-sync-ctl`.
    #[serde(default = "default_ipc_name")]
    pub ipc_name: String,
    /// Todoist connectivity.
    #[serde(default)]
    pub todoist: TodoistConfig,
    /// Cycle and scheduler behaviour.
    #[serde(default)]
    pub sync: SyncSettings,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and normalize paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Fill in the Todoist token from OS keychain or environment.
    ///
    /// A token already present in the config file wins. A missing token is
    /// not an error: cycles are skipped with a warning until one is set.
    pub async fn load_credentials(&mut self) {
        if self.todoist.has_credential() {
            return;
        }
        match load_credential("todoist_api_token", "TODOIST_API_TOKEN").await {
            Some(token) => {
                self.todoist.api_token = token;
                info!("todoist token loaded");
            }
            None => warn!("todoist token not configured; sync cycles will be skipped"),
        }
    }

    /// Copy the fields that only take effect at startup from `running`.
    ///
    /// The graph directory, state directory and IPC name are bound when the
    /// daemon starts. Returns the names of the fields whose edits were
    /// discarded.
    pub fn keep_startup_fields(&mut self, running: &Self) -> Vec<&'static str> {
        let mut discarded = Vec::new();
        if self.graph_dir != running.graph_dir {
            self.graph_dir.clone_from(&running.graph_dir);
            discarded.push("graph_dir");
        }
        if self.state_dir != running.state_dir {
            self.state_dir.clone_from(&running.state_dir);
            discarded.push("state_dir");
        }
        if self.ipc_name != running.ipc_name {
            self.ipc_name.clone_from(&running.ipc_name);
            discarded.push("ipc_name");
        }
        discarded
    }

    /// Derived path of the `SQLite` ledger database.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.state_dir
            .clone()
            .unwrap_or_else(|| self.graph_dir.join(".inbox-sync"))
            .join("inbox-sync.db")
    }

    fn validate(&mut self) -> Result<()> {
        if self.sync.strategies.is_empty() {
            return Err(AppError::Config(
                "sync.strategies must not be empty".into(),
            ));
        }

        if self.todoist.request_timeout_seconds == 0 {
            return Err(AppError::Config(
                "todoist.request_timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.sync.journal_heading.trim().is_empty() {
            return Err(AppError::Config(
                "sync.journal_heading must not be empty".into(),
            ));
        }

        // An empty project id in the file means "auto-discover".
        if self
            .todoist
            .inbox_project_id
            .as_deref()
            .is_some_and(|id| id.trim().is_empty())
        {
            self.todoist.inbox_project_id = None;
        }

        let canonical_root = self
            .graph_dir
            .canonicalize()
            .map_err(|err| AppError::Config(format!("graph_dir invalid: {err}")))?;
        self.graph_dir = canonical_root;

        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Option<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await;

    match keychain_result {
        Ok(Ok(value)) if !value.is_empty() => return Some(value),
        Ok(Ok(_)) => warn!(key = keyring_key, "keychain entry is empty, trying env var"),
        Ok(Err(err)) => warn!(key = keyring_key, ?err, "keychain lookup failed, trying env var"),
        Err(err) => warn!(key = keyring_key, %err, "keychain task panicked, trying env var"),
    }

    env::var(env_key).ok().filter(|value| !value.trim().is_empty())
}
