#![forbid(unsafe_code)]

//! Imports the Todoist Inbox into today's outliner journal page.

pub mod app;
pub mod config;
pub mod config_watcher;
pub mod errors;
pub mod format;
pub mod host;
pub mod ipc;
pub mod ledger;
pub mod models;
pub mod persistence;
pub mod sink;
pub mod sync;
pub mod todoist;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
