//! Thin authenticated client for the Todoist REST API v2.

use futures_util::future::{BoxFuture, FutureExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::TodoistConfig;
use crate::models::task::{Project, Task};
use crate::{AppError, Result};

use super::TaskSource;

/// HTTP client bound to one API token and base URL.
#[derive(Clone)]
pub struct TodoistClient {
    http: Client,
    base: Url,
}

impl TodoistClient {
    /// Build a client from Todoist settings.
    ///
    /// Every request carries the bearer token, a JSON content type, and the
    /// configured timeout.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigurationMissing` if no token is set, and
    /// `AppError::Config` if the base URL or token is malformed.
    pub fn new(config: &TodoistConfig) -> Result<Self> {
        if !config.has_credential() {
            return Err(AppError::ConfigurationMissing(
                "todoist api token not set".into(),
            ));
        }

        let base = Url::parse(config.api_base.trim_end_matches('/'))
            .map_err(|err| AppError::Config(format!("invalid todoist api_base: {err}")))?;
        if base.cannot_be_a_base() {
            return Err(AppError::Config(format!(
                "invalid todoist api_base: {}",
                config.api_base
            )));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_token.trim()))
            .map_err(|err| AppError::Config(format!("invalid todoist api token: {err}")))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| AppError::Config(format!("failed to build http client: {err}")))?;

        Ok(Self { http, base })
    }

    /// Resolve the id of the project flagged `is_inbox_project`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no project carries the flag, or
    /// `AppError::Transport` if the request fails.
    pub async fn inbox_project_id(&self) -> Result<String> {
        let projects: Vec<Project> = self.get_json(self.endpoint(&["projects"])?).await?;
        projects
            .into_iter()
            .find(|project| project.is_inbox_project)
            .map(|project| project.id)
            .ok_or_else(|| AppError::NotFound("no inbox project in todoist".into()))
    }

    /// Fetch all tasks of the Inbox, discovering it when `project_id` is `None`.
    ///
    /// # Errors
    ///
    /// Propagates discovery and transport failures.
    pub async fn inbox_tasks(&self, project_id: Option<&str>) -> Result<Vec<Task>> {
        let project_id = match project_id {
            Some(id) => id.to_owned(),
            None => {
                let id = self.inbox_project_id().await?;
                debug!(project_id = %id, "discovered inbox project");
                id
            }
        };

        let mut url = self.endpoint(&["tasks"])?;
        url.query_pairs_mut().append_pair("project_id", &project_id);
        let tasks: Vec<Task> = self.get_json(url).await?;
        info!(project_id = %project_id, count = tasks.len(), "fetched inbox tasks");
        Ok(tasks)
    }

    /// Delete one task.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Transport` on non-2xx or network failure.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let url = self.endpoint(&["tasks", id])?;
        let resp = self.http.delete(url).send().await?;
        check_status(resp).await?;
        debug!(task_id = id, "deleted todoist task");
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let resp = self.http.get(url).send().await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| AppError::Config("todoist api_base cannot be a base url".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Map non-2xx responses to `AppError::Transport` carrying status and body.
async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(AppError::http(status.as_u16(), body))
}

impl TaskSource for TodoistClient {
    fn list_inbox_tasks<'a>(
        &'a self,
        project_id: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Vec<Task>>> {
        self.inbox_tasks(project_id).boxed()
    }

    fn delete_task<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>> {
        self.delete(id).boxed()
    }
}
