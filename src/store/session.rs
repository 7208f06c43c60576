//! Namespaced session persistence
//!
//! All operations are best-effort: a broken store logs a warning and the
//! widget carries on with whatever it has in memory.

use super::{KeyValueStore, StorageError};
use crate::state_machine::{Message, SessionState};
use crate::tree::NodeId;
use serde_json::Value;

const STATE_SUFFIX: &str = "state";
const SESSION_ID_SUFFIX: &str = "threadId";

/// Session state and session id stored under `"{prefix}:..."` keys
pub struct SessionStore<K> {
    store: K,
    prefix: String,
    initial_node: NodeId,
}

impl<K: KeyValueStore> SessionStore<K> {
    pub fn new(store: K, prefix: impl Into<String>, initial_node: impl Into<NodeId>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            initial_node: initial_node.into(),
        }
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}:{suffix}", self.prefix)
    }

    pub fn state_key(&self) -> String {
        self.key(STATE_SUFFIX)
    }

    pub fn session_id_key(&self) -> String {
        self.key(SESSION_ID_SUFFIX)
    }

    /// Load the persisted session.
    ///
    /// `None` when nothing is stored, the store fails, or the record is not a
    /// JSON object. Fields are taken individually: a string `currentNode` and
    /// an array `history` each override the defaults when present.
    pub fn load(&self) -> Option<SessionState> {
        let raw = match self.store.get(&self.state_key()) {
            Ok(Some(raw)) if !raw.is_empty() => raw,
            Ok(_) => return None,
            Err(e) => {
                tracing::warn!(key = %self.state_key(), error = %e, "Failed to read session state");
                return None;
            }
        };

        let record = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(record)) => record,
            Ok(_) => return None,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring malformed session state");
                return None;
            }
        };

        let mut session = SessionState::new(self.initial_node.clone());
        if let Some(Value::String(node)) = record.get("currentNode") {
            session.current_node.clone_from(node);
        }
        if let Some(Value::Array(items)) = record.get("history") {
            session.history = items
                .iter()
                .filter_map(|item| serde_json::from_value::<Message>(item.clone()).ok())
                .collect();
        }
        Some(session)
    }

    pub fn save(&self, session: &SessionState) {
        if let Err(e) = self.try_save(session) {
            tracing::warn!(key = %self.state_key(), error = %e, "Failed to persist session state");
        }
    }

    fn try_save(&self, session: &SessionState) -> Result<(), StorageError> {
        let raw = serde_json::to_string(session)?;
        self.store.set(&self.state_key(), &raw)
    }

    /// Stored session id; empty values count as absent
    pub fn load_session_id(&self) -> Option<String> {
        match self.store.get(&self.session_id_key()) {
            Ok(id) => id.filter(|id| !id.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read session id");
                None
            }
        }
    }

    pub fn save_session_id(&self, id: &str) {
        if let Err(e) = self.store.set(&self.session_id_key(), id) {
            tracing::warn!(error = %e, "Failed to persist session id");
        }
    }

    /// Explicit id, else the stored one, else a fresh UUID that is then stored
    pub fn resolve_session_id(&self, explicit: Option<&str>) -> String {
        if let Some(id) = explicit.filter(|id| !id.is_empty()) {
            return id.to_string();
        }
        if let Some(id) = self.load_session_id() {
            return id;
        }
        let id = uuid::Uuid::new_v4().to_string();
        tracing::debug!(session_id = %id, "Generated new session id");
        self.save_session_id(&id);
        id
    }
}
