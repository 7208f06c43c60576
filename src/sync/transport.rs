//! HTTP transport for the chat backend

use super::wire::{OutgoingMessage, ServerHistory};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::Client;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport failure or non-success HTTP status
    #[error("Chat request failed: {0}")]
    Fetch(String),
    /// Response body was not JSON
    #[error("Chat response decode failed: {0}")]
    Decode(String),
}

/// Raw access to the chat backend
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// GET the transcript for a session
    async fn get_messages(&self, session_id: &str) -> Result<ServerHistory, SyncError>;

    /// POST one message; only the status is checked
    async fn post_message(&self, message: &OutgoingMessage) -> Result<(), SyncError>;
}

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for Arc<T> {
    async fn get_messages(&self, session_id: &str) -> Result<ServerHistory, SyncError> {
        (**self).get_messages(session_id).await
    }

    async fn post_message(&self, message: &OutgoingMessage) -> Result<(), SyncError> {
        (**self).post_message(message).await
    }
}

/// Join a base URL and an endpoint path with exactly one slash between them
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// reqwest-backed chat transport
#[derive(Debug, Clone)]
pub struct HttpChatTransport {
    client: Client,
    get_url: String,
    send_url: String,
    headers: HeaderMap,
}

impl HttpChatTransport {
    pub fn new(
        client: Client,
        base_url: &str,
        get_path: &str,
        send_path: &str,
        extra_headers: &BTreeMap<String, String>,
    ) -> Self {
        Self {
            client,
            get_url: join_url(base_url, get_path),
            send_url: join_url(base_url, send_path),
            headers: build_headers(extra_headers),
        }
    }

    pub fn get_url(&self) -> &str {
        &self.get_url
    }

    pub fn send_url(&self) -> &str {
        &self.send_url
    }
}

/// Turn configured headers into a header map, skipping invalid entries
fn build_headers(extra: &BTreeMap<String, String>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in extra {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Skipping invalid chat header"),
        }
    }
    headers
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn get_messages(&self, session_id: &str) -> Result<ServerHistory, SyncError> {
        let response = self
            .client
            .get(&self.get_url)
            .query(&[("threadId", session_id)])
            .header(ACCEPT, "application/json")
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| SyncError::Fetch(format!("GET messages failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Fetch(format!("GET messages failed: {status}")));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SyncError::Decode(e.to_string()))?;

        Ok(ServerHistory::from_value(&body))
    }

    async fn post_message(&self, message: &OutgoingMessage) -> Result<(), SyncError> {
        let response = self
            .client
            .post(&self.send_url)
            .header(ACCEPT, "application/json")
            .headers(self.headers.clone())
            .json(message)
            .send()
            .await
            .map_err(|e| SyncError::Fetch(format!("POST message failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Fetch(format!("POST message failed: {status}")));
        }
        Ok(())
    }
}
