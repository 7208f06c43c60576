//! Remote decision tree sources

use super::DecisionTree;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TreeError {
    /// Transport failure or non-success HTTP status
    #[error("Decision tree fetch failed: {0}")]
    Fetch(String),
    /// Body was not a valid tree
    #[error("Decision tree decode failed: {0}")]
    Decode(String),
    #[error("No static tree or remote URL configured")]
    NotConfigured,
}

/// Anything that can produce a fresh copy of the decision tree
#[async_trait]
pub trait TreeSource: Send + Sync {
    async fn fetch(&self) -> Result<DecisionTree, TreeError>;
}

#[async_trait]
impl<T: TreeSource + ?Sized> TreeSource for Arc<T> {
    async fn fetch(&self) -> Result<DecisionTree, TreeError> {
        (**self).fetch().await
    }
}

/// Fetches the tree as JSON over HTTP
#[derive(Debug, Clone)]
pub struct HttpTreeSource {
    client: Client,
    url: String,
}

impl HttpTreeSource {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TreeSource for HttpTreeSource {
    async fn fetch(&self) -> Result<DecisionTree, TreeError> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| TreeError::Fetch(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TreeError::Fetch(format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| TreeError::Fetch(format!("Failed to read response: {e}")))?;

        serde_json::from_str(&body).map_err(|e| TreeError::Decode(e.to_string()))
    }
}
