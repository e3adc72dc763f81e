//! Remote task source abstraction and the Todoist REST client.
//!
//! The [`TaskSource`] trait decouples the sync cycle from the HTTP client
//! so cycles can run against a test double.

pub mod client;

use futures_util::future::BoxFuture;

use crate::models::task::Task;
use crate::Result;

pub use client::TodoistClient;

/// Read and delete access to the Inbox of a remote task service.
pub trait TaskSource: Send + Sync {
    /// Fetch every task in the Inbox project.
    ///
    /// When `project_id` is `None` the Inbox is discovered first; no
    /// discovery result is cached across calls.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`](crate::AppError::NotFound) if no project is flagged as Inbox.
    /// Returns [`AppError::Transport`](crate::AppError::Transport) on non-2xx or network failure.
    fn list_inbox_tasks<'a>(
        &'a self,
        project_id: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Vec<Task>>>;

    /// Delete a single task by id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) if the service rejects the deletion.
    fn delete_task<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>>;
}
