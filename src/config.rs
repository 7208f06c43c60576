//! Widget configuration
//!
//! Resolution order: defaults, then declarative attributes (the
//! `data-*` keys a host page would put on the embedding element), then
//! programmatic overrides.

use crate::actions::ActionRegistry;
use crate::state_machine::state::{DEFAULT_END_MESSAGE, DEFAULT_SEND_FAILURE_MESSAGE};
use crate::state_machine::EngineContext;
use crate::sync::{HttpChatTransport, SyncSettings};
use crate::tree::{DecisionTree, HttpTreeSource, NodeId};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

pub const ATTR_API_URL: &str = "data-api-url";
pub const ATTR_UPDATE_INTERVAL: &str = "data-update-interval";
pub const ATTR_CHAT_API_BASE_URL: &str = "data-chat-api-base-url";
pub const ATTR_CHAT_GET_PATH: &str = "data-chat-get-path";
pub const ATTR_CHAT_SEND_PATH: &str = "data-chat-send-path";
pub const ATTR_THREAD_ID: &str = "data-thread-id";
pub const ATTR_USE_SERVER_HISTORY: &str = "data-use-server-history";

/// Environment variables and the attribute each one stands in for
const ENV_ATTRIBUTES: [(&str, &str); 7] = [
    ("DECISION_CHAT_API_URL", ATTR_API_URL),
    ("DECISION_CHAT_UPDATE_INTERVAL", ATTR_UPDATE_INTERVAL),
    ("DECISION_CHAT_CHAT_API_BASE_URL", ATTR_CHAT_API_BASE_URL),
    ("DECISION_CHAT_CHAT_GET_PATH", ATTR_CHAT_GET_PATH),
    ("DECISION_CHAT_CHAT_SEND_PATH", ATTR_CHAT_SEND_PATH),
    ("DECISION_CHAT_THREAD_ID", ATTR_THREAD_ID),
    ("DECISION_CHAT_USE_SERVER_HISTORY", ATTR_USE_SERVER_HISTORY),
];

pub const DEFAULT_UPDATE_INTERVAL_MS: i64 = 10_000;
pub const DEFAULT_CHAT_PATH: &str = "/chat/messages";
pub const DEFAULT_INITIAL_NODE: &str = "start";
pub const DEFAULT_STORAGE_KEY_PREFIX: &str = "decision-chat";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Resolved widget configuration
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetConfig {
    /// Remote tree location; `None` means no polling
    pub api_url: Option<String>,
    /// Tree used instead of fetching; polling still runs when `api_url` is set
    pub initial_tree: Option<DecisionTree>,
    /// Milliseconds between polls; zero or negative disables polling
    pub update_interval_ms: i64,
    /// Chat backend root; empty disables all chat sync
    pub chat_api_base_url: String,
    pub chat_get_path: String,
    pub chat_send_path: String,
    /// Explicit session id, overrides the stored one
    pub thread_id: Option<String>,
    pub chat_headers: BTreeMap<String, String>,
    pub use_server_history: bool,
    pub initial_node: NodeId,
    pub storage_key_prefix: String,
    pub end_fallback_message: String,
    pub send_failure_message: String,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            initial_tree: None,
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            chat_api_base_url: String::new(),
            chat_get_path: DEFAULT_CHAT_PATH.to_string(),
            chat_send_path: DEFAULT_CHAT_PATH.to_string(),
            thread_id: None,
            chat_headers: BTreeMap::new(),
            use_server_history: true,
            initial_node: DEFAULT_INITIAL_NODE.to_string(),
            storage_key_prefix: DEFAULT_STORAGE_KEY_PREFIX.to_string(),
            end_fallback_message: DEFAULT_END_MESSAGE.to_string(),
            send_failure_message: DEFAULT_SEND_FAILURE_MESSAGE.to_string(),
        }
    }
}

impl WidgetConfig {
    /// Defaults with declarative attributes applied
    pub fn from_attributes(attributes: &HashMap<String, String>) -> Self {
        let mut config = Self::default();
        config.apply_attributes(attributes);
        config
    }

    /// Defaults with `DECISION_CHAT_*` environment variables applied as attributes
    pub fn from_env() -> Self {
        let attributes = ENV_ATTRIBUTES
            .iter()
            .filter_map(|(var, attr)| {
                std::env::var(var)
                    .ok()
                    .map(|value| ((*attr).to_string(), value))
            })
            .collect();
        Self::from_attributes(&attributes)
    }

    /// Apply attribute values. Empty values are ignored, except that a
    /// present `data-use-server-history` always decides the flag.
    pub fn apply_attributes(&mut self, attributes: &HashMap<String, String>) {
        let non_empty = |key: &str| attributes.get(key).filter(|v| !v.is_empty());

        if let Some(url) = non_empty(ATTR_API_URL) {
            self.api_url = Some(url.clone());
        }
        if let Some(raw) = non_empty(ATTR_UPDATE_INTERVAL) {
            match parse_leading_int(raw) {
                Some(ms) if ms != 0 => self.update_interval_ms = ms,
                _ => tracing::debug!(value = %raw, "Ignoring unusable update interval"),
            }
        }
        if let Some(base) = non_empty(ATTR_CHAT_API_BASE_URL) {
            self.chat_api_base_url.clone_from(base);
        }
        if let Some(path) = non_empty(ATTR_CHAT_GET_PATH) {
            self.chat_get_path.clone_from(path);
        }
        if let Some(path) = non_empty(ATTR_CHAT_SEND_PATH) {
            self.chat_send_path.clone_from(path);
        }
        if let Some(id) = non_empty(ATTR_THREAD_ID) {
            self.thread_id = Some(id.clone());
        }
        if let Some(flag) = attributes.get(ATTR_USE_SERVER_HISTORY) {
            self.use_server_history = flag == "true";
        }
    }

    /// Apply programmatic overrides; every set field wins
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(url) = overrides.api_url {
            self.api_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Some(tree) = overrides.initial_tree {
            self.initial_tree = Some(tree);
        }
        if let Some(ms) = overrides.update_interval_ms {
            self.update_interval_ms = ms;
        }
        if let Some(base) = overrides.chat_api_base_url {
            self.chat_api_base_url = base;
        }
        if let Some(path) = overrides.chat_get_path {
            self.chat_get_path = path;
        }
        if let Some(path) = overrides.chat_send_path {
            self.chat_send_path = path;
        }
        if let Some(id) = overrides.thread_id {
            self.thread_id = Some(id).filter(|i| !i.is_empty());
        }
        if let Some(headers) = overrides.chat_headers {
            self.chat_headers = headers;
        }
        if let Some(flag) = overrides.use_server_history {
            self.use_server_history = flag;
        }
        if let Some(node) = overrides.initial_node {
            self.initial_node = node;
        }
        if let Some(prefix) = overrides.storage_key_prefix {
            self.storage_key_prefix = prefix;
        }
        if let Some(message) = overrides.end_fallback_message {
            self.end_fallback_message = message;
        }
        if let Some(message) = overrides.send_failure_message {
            self.send_failure_message = message;
        }
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.apply_overrides(overrides);
        self
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            enabled: !self.chat_api_base_url.is_empty(),
            use_server_history: self.use_server_history,
        }
    }

    /// Engine context knowing which action names are registered
    pub fn engine_context(&self, actions: &ActionRegistry) -> EngineContext {
        EngineContext::new(self.initial_node.clone())
            .with_actions(actions.names())
            .with_messages(
                self.end_fallback_message.clone(),
                self.send_failure_message.clone(),
            )
    }

    pub fn tree_source(&self, client: &reqwest::Client) -> Option<HttpTreeSource> {
        self.api_url
            .as_ref()
            .map(|url| HttpTreeSource::new(client.clone(), url.clone()))
    }

    pub fn chat_transport(&self, client: &reqwest::Client) -> HttpChatTransport {
        HttpChatTransport::new(
            client.clone(),
            &self.chat_api_base_url,
            &self.chat_get_path,
            &self.chat_send_path,
            &self.chat_headers,
        )
    }
}

/// Programmatic configuration, camelCase like the embedding page's object
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOverrides {
    pub api_url: Option<String>,
    pub initial_tree: Option<DecisionTree>,
    #[serde(alias = "updateInterval")]
    pub update_interval_ms: Option<i64>,
    pub chat_api_base_url: Option<String>,
    pub chat_get_path: Option<String>,
    pub chat_send_path: Option<String>,
    pub thread_id: Option<String>,
    pub chat_headers: Option<BTreeMap<String, String>>,
    pub use_server_history: Option<bool>,
    pub initial_node: Option<NodeId>,
    pub storage_key_prefix: Option<String>,
    pub end_fallback_message: Option<String>,
    pub send_failure_message: Option<String>,
}

impl ConfigOverrides {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}

/// Integer prefix of a string: optional whitespace, sign, then digits.
/// Trailing garbage is ignored; no digits at all means `None`.
fn parse_leading_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    let value: i64 = digits.parse().ok()?;
    Some(if negative { -value } else { value })
}
