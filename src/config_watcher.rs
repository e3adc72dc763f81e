//! Hot-reload watcher for `config.toml`.
//!
//! [`ConfigWatcher`] uses the `notify` crate to watch the config file.
//! On every change the whole file is re-parsed and validated; a config that
//! differs from the last published one is sent on a `tokio::sync::watch`
//! channel. The daemon re-arms its scheduler from that channel.
//!
//! A file that fails to parse keeps the previous config in place.
//!
//! Published configs are exactly what the file says. Credentials from the
//! keyring or environment are resolved by the subscriber, so an unchanged
//! file never looks modified.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::GlobalConfig;
use crate::{AppError, Result};

/// Returns `true` for events that mean the file was written or replaced.
fn is_config_change(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Re-read `path` and publish it when it differs from the current value.
///
/// Returns `true` when a new config was published.
pub(crate) fn reload_into(path: &Path, sender: &watch::Sender<Arc<GlobalConfig>>) -> bool {
    match GlobalConfig::load_from_path(path) {
        Ok(fresh) => {
            let published = sender.send_if_modified(|current| {
                if **current == fresh {
                    false
                } else {
                    *current = Arc::new(fresh);
                    true
                }
            });
            if published {
                info!(path = %path.display(), "hot-reloaded configuration");
            } else {
                debug!(path = %path.display(), "config event without effective change");
            }
            published
        }
        Err(err) => {
            warn!(
                %err,
                path = %path.display(),
                "failed to reload config; keeping previous values"
            );
            false
        }
    }
}

/// Watches `config.toml` and publishes each effective change.
///
/// Dropping the watcher stops the OS watch.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    sender: watch::Sender<Arc<GlobalConfig>>,
}

impl ConfigWatcher {
    /// Start watching `config_path`, seeded with the already-loaded `initial` config.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the `notify` watcher cannot be created
    /// or the path cannot be watched.
    pub fn new(config_path: &Path, initial: GlobalConfig) -> Result<Self> {
        let (sender, _rx) = watch::channel(Arc::new(initial));
        let sender_for_callback = sender.clone();
        let path_for_callback: PathBuf = config_path.to_path_buf();
        let file_name = config_path.file_name().map(std::ffi::OsStr::to_os_string);

        let mut watcher = notify::recommended_watcher(
            move |result: std::result::Result<Event, notify::Error>| match result {
                Ok(event) if is_config_change(&event) => {
                    // The parent directory is watched; ignore sibling files.
                    let touches_config = event.paths.is_empty()
                        || event
                            .paths
                            .iter()
                            .any(|p| p.file_name().map(std::ffi::OsStr::to_os_string) == file_name);
                    if touches_config {
                        reload_into(&path_for_callback, &sender_for_callback);
                    }
                }
                Err(err) => {
                    warn!(%err, "config file watcher error");
                }
                _ => {}
            },
        )
        .map_err(|err| AppError::Config(format!("failed to create config file watcher: {err}")))?;

        // Rename-based saves replace the inode, so watch the directory.
        let watch_target = config_path
            .parent()
            .filter(|p| p != &Path::new(""))
            .unwrap_or(config_path);

        watcher
            .watch(watch_target, RecursiveMode::NonRecursive)
            .map_err(|err| {
                AppError::Config(format!(
                    "failed to watch config path '{}': {err}",
                    watch_target.display()
                ))
            })?;

        info!(path = %config_path.display(), "config watcher started");

        Ok(Self {
            _watcher: watcher,
            sender,
        })
    }

    /// Subscribe to published configs.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<GlobalConfig>> {
        self.sender.subscribe()
    }
}
