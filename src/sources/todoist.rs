//! Todoist REST client — tasks due or overdue for the target date.

use async_trait::async_trait;
use chrono::NaiveDate;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::error::SourceError;
use crate::sources::types::TaskRecord;
use crate::sources::TaskSource;

const TODOIST_BASE: &str = "https://api.todoist.com/rest/v2";

#[derive(Debug, Deserialize)]
struct TaskResource {
    id: String,
    content: String,
    #[serde(default)]
    due: Option<TaskDue>,
    #[serde(default = "default_priority")]
    priority: u8,
    #[serde(default)]
    project_id: Option<String>,
}

fn default_priority() -> u8 {
    1
}

#[derive(Debug, Deserialize)]
struct TaskDue {
    #[serde(default)]
    date: Option<NaiveDate>,
}

/// Todoist client. Uses the task filter language to pull the target
/// date's tasks plus anything overdue that is still relevant.
pub struct TodoistClient {
    http: reqwest::Client,
    api_token: SecretString,
}

impl TodoistClient {
    pub fn new(http: reqwest::Client, api_token: SecretString) -> Self {
        Self { http, api_token }
    }

    fn err(reason: impl std::fmt::Display) -> SourceError {
        SourceError::RequestFailed {
            service: "todoist".into(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl TaskSource for TodoistClient {
    async fn list_tasks(&self, date: NaiveDate) -> Result<Vec<TaskRecord>, SourceError> {
        let filter = format!("due: {} | overdue", date.format("%Y-%m-%d"));
        debug!(%filter, "listing todoist tasks");

        let response = self
            .http
            .get(format!("{TODOIST_BASE}/tasks"))
            .query(&[("filter", filter.as_str())])
            .bearer_auth(self.api_token.expose_secret())
            .send()
            .await
            .map_err(Self::err)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited {
                service: "todoist".into(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            return Err(Self::err(format!("HTTP {status}: {excerpt}")));
        }

        let tasks: Vec<TaskResource> =
            response
                .json()
                .await
                .map_err(|e| SourceError::InvalidResponse {
                    service: "todoist".into(),
                    reason: e.to_string(),
                })?;

        Ok(tasks
            .into_iter()
            .map(|t| TaskRecord {
                id: t.id,
                content: t.content,
                due: t.due.and_then(|d| d.date),
                priority: t.priority,
                project: t.project_id,
            })
            .collect())
    }
}
