//! HTTP task store
//!
//! Talks to a PostgREST-style table API (the REST dialect hosted Postgres
//! backends expose) for reads and writes, and to a Server-Sent Events
//! endpoint for the table's change feed.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use reqwest_eventsource::{Event, EventSource};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{ChangeEvent, ChangeKind, StoreError, Subscription, TaskStore};
use crate::config::StoreConfig;
use crate::domain::{Task, TaskId, TaskStatus};

/// Connect timeout for every request, including the change feed
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Buffered change events before the reader waits on the consumer
const CHANGE_BUFFER: usize = 64;

/// Task table reached over HTTP
pub struct RestStore {
    base_url: String,
    table: String,
    changes_path: String,
    api_key: Option<String>,
    http: Client,
}

impl RestStore {
    /// Create a store from configuration
    ///
    /// Reads the API key from the environment variable named in config; when
    /// it is unset requests go out without credentials.
    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        debug!(base_url = %config.base_url, table = %config.table, "from_config: called");
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(StoreError::Config(format!(
                "base-url must start with http:// or https://, got '{}'",
                config.base_url
            )));
        }
        if config.table.trim().is_empty() {
            return Err(StoreError::Config("table cannot be empty".to_string()));
        }

        let api_key = config.get_api_key();
        if api_key.is_none() {
            warn!(env = %config.api_key_env, "No API key set, sending unauthenticated requests");
        }

        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(StoreError::Network)?;

        Ok(Self {
            base_url,
            table: config.table.clone(),
            changes_path: config.changes_path.clone(),
            api_key,
            http,
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn changes_url(&self) -> String {
        let path = self.changes_path.trim_start_matches('/');
        format!("{}/{}", self.base_url, path)
    }

    /// Attach credentials when we have them
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("apikey", key).bearer_auth(key),
            None => request,
        }
    }
}

/// Turn a non-success response into an [`StoreError::ApiError`]
async fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    debug!(status = status.as_u16(), "check_status: API error");
    Err(StoreError::ApiError {
        status: status.as_u16(),
        message: error_message(&body, status.canonical_reason().unwrap_or("request failed")),
    })
}

/// Pull a readable message out of an error body
///
/// PostgREST answers errors with `{"message": ..., "code": ...}`; anything
/// else is passed through as text.
fn error_message(body: &str, fallback: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body)
        && let Some(message) = value["message"].as_str()
    {
        return message.to_string();
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Read a task id out of a change payload row
fn row_id(row: &serde_json::Value) -> Option<TaskId> {
    match &row["id"] {
        serde_json::Value::String(s) => Some(TaskId::new(s.clone())),
        serde_json::Value::Number(n) => Some(TaskId::new(n.to_string())),
        _ => None,
    }
}

/// Interpret one change-feed message
///
/// The change type comes from the payload's `type` (or `eventType`) field,
/// falling back to the SSE event name. Anything that is not an insert,
/// update or delete (heartbeats, presence) yields `None`.
fn parse_change(event_name: &str, data: &str) -> Option<ChangeEvent> {
    let payload: serde_json::Value = serde_json::from_str(data).unwrap_or(serde_json::Value::Null);

    let kind = payload["type"]
        .as_str()
        .or_else(|| payload["eventType"].as_str())
        .and_then(ChangeKind::parse)
        .or_else(|| ChangeKind::parse(event_name))?;

    let task_id = row_id(&payload["record"]).or_else(|| row_id(&payload["old_record"]));
    Some(ChangeEvent::new(kind, task_id))
}

#[async_trait]
impl TaskStore for RestStore {
    async fn list(&self) -> Result<Vec<Task>, StoreError> {
        debug!(table = %self.table, "list: called");
        let response = self
            .authorize(self.http.get(self.table_url()))
            .query(&[("select", "*"), ("order", "created_at.desc")])
            .send()
            .await?;
        let body = check_status(response).await?.text().await?;
        let tasks: Vec<Task> = serde_json::from_str(&body)?;
        debug!(count = tasks.len(), "list: success");
        Ok(tasks)
    }

    async fn update_status(&self, id: &TaskId, status: TaskStatus) -> Result<(), StoreError> {
        debug!(%id, %status, "update_status: called");
        let response = self
            .authorize(self.http.patch(self.table_url()))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(&serde_json::json!({ "status": status }))
            .send()
            .await?;
        let body = check_status(response).await?.text().await?;

        let rows: Vec<serde_json::Value> = serde_json::from_str(&body)?;
        if rows.is_empty() {
            debug!(%id, "update_status: no row matched");
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(())
    }

    async fn subscribe(&self) -> Result<Subscription, StoreError> {
        let url = self.changes_url();
        debug!(%url, table = %self.table, "subscribe: called");
        let request = self
            .authorize(self.http.get(url))
            .query(&[("table", self.table.as_str())])
            .header("Accept", "text/event-stream");

        let mut es = EventSource::new(request).map_err(|e| StoreError::InvalidResponse(e.to_string()))?;
        let (tx, rx) = mpsc::channel(CHANGE_BUFFER);

        let reader = tokio::spawn(async move {
            while let Some(event) = es.next().await {
                match event {
                    Ok(Event::Open) => {
                        info!("Change feed connected");
                    }
                    Ok(Event::Message(msg)) => match parse_change(&msg.event, &msg.data) {
                        Some(change) => {
                            debug!(kind = %change.kind, "subscribe: change received");
                            if tx.send(change).await.is_err() {
                                debug!("subscribe: consumer gone");
                                break;
                            }
                        }
                        None => {
                            debug!(event = %msg.event, "subscribe: ignoring message");
                        }
                    },
                    Err(reqwest_eventsource::Error::StreamEnded) => {
                        debug!("subscribe: stream ended");
                        break;
                    }
                    Err(e @ reqwest_eventsource::Error::InvalidStatusCode(..))
                    | Err(e @ reqwest_eventsource::Error::InvalidContentType(..)) => {
                        warn!(error = %e, "Change feed rejected, giving up");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Change feed error, reconnecting");
                    }
                }
            }
            es.close();
        });

        Ok(Subscription::new(rx, move || reader.abort()))
    }
}
