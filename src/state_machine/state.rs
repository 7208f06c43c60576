//! Widget state types

use crate::tree::{DecisionOption, DecisionTree, NodeId};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::sync::Arc;

/// Fallback bot message for the terminal node when the tree does not define one
pub const DEFAULT_END_MESSAGE: &str = "Listo.";

/// Inline bot message shown when an outbound send fails
pub const DEFAULT_SEND_FAILURE_MESSAGE: &str = "No pude enviar el mensaje. Intenta de nuevo.";

// ============================================================================
// Transcript
// ============================================================================

/// Who authored a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    /// Map a wire label onto a sender. Only `bot` and `assistant` are bots.
    pub fn from_label(label: &str) -> Self {
        match label {
            "bot" | "assistant" => Sender::Bot,
            _ => Sender::User,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Bot => "bot",
        }
    }
}

impl Serialize for Sender {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Sender {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = Option::<String>::deserialize(deserializer)?;
        Ok(label.map_or(Sender::User, |l| Sender::from_label(&l)))
    }
}

/// One entry in the visible conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub text: String,
    pub from: Sender,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            from: Sender::User,
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            from: Sender::Bot,
        }
    }
}

// ============================================================================
// Session State
// ============================================================================

/// Persisted conversation state, survives reloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub current_node: NodeId,
    #[serde(default)]
    pub history: Vec<Message>,
}

impl SessionState {
    pub fn new(initial_node: impl Into<NodeId>) -> Self {
        Self {
            current_node: initial_node.into(),
            history: Vec::new(),
        }
    }
}

/// Everything the transition function reads and rewrites
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetState {
    pub session: SessionState,
    /// Latest tree snapshot; absent until the first successful load
    pub tree: Option<Arc<DecisionTree>>,
    /// Whether the panel is visible. Never persisted.
    pub is_open: bool,
    /// Stamp of the newest server transcript applied; older ones are stale
    pub history_seq: u64,
}

impl WidgetState {
    pub fn new(session: SessionState) -> Self {
        Self {
            session,
            tree: None,
            is_open: false,
            history_seq: 0,
        }
    }

    /// Message of the current node, if the node exists
    pub fn current_message(&self) -> Option<&str> {
        self.tree
            .as_deref()
            .and_then(|t| t.get(&self.session.current_node))
            .map(|n| n.message.as_str())
    }

    pub fn current_options(&self) -> &[DecisionOption] {
        self.tree
            .as_deref()
            .map_or(&[], |t| t.options_at(&self.session.current_node))
    }
}

// ============================================================================
// Engine Context
// ============================================================================

/// Immutable configuration consulted by transitions
#[derive(Debug, Clone)]
pub struct EngineContext {
    pub initial_node: NodeId,
    pub end_fallback_message: String,
    pub send_failure_message: String,
    registered_actions: HashSet<String>,
}

impl EngineContext {
    pub fn new(initial_node: impl Into<NodeId>) -> Self {
        Self {
            initial_node: initial_node.into(),
            end_fallback_message: DEFAULT_END_MESSAGE.to_string(),
            send_failure_message: DEFAULT_SEND_FAILURE_MESSAGE.to_string(),
            registered_actions: HashSet::new(),
        }
    }

    #[must_use]
    pub fn with_actions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registered_actions
            .extend(names.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_messages(
        mut self,
        end_fallback: impl Into<String>,
        send_failure: impl Into<String>,
    ) -> Self {
        self.end_fallback_message = end_fallback.into();
        self.send_failure_message = send_failure.into();
        self
    }

    /// Unknown action names resolve to "no handler", never an error
    pub fn has_action(&self, name: &str) -> bool {
        self.registered_actions.contains(name)
    }
}
