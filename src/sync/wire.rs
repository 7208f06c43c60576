//! Chat API wire types

use crate::state_machine::{Message, Sender};
use crate::tree::{DecisionOption, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Context attached to every mirrored message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageMeta {
    /// User clicked an option
    DecisionOption {
        #[serde(rename = "currentNode")]
        current_node: NodeId,
        option: DecisionOption,
    },
    /// Bot prompt emitted after a transition
    BotMessage { node: NodeId },
    /// User typed free text
    FreeText {
        #[serde(rename = "currentNode")]
        current_node: NodeId,
    },
}

/// POST body for the send endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub thread_id: String,
    pub text: String,
    pub meta: MessageMeta,
    pub current_node: NodeId,
}

/// Transcript as reported by the chat backend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerHistory {
    pub messages: Vec<Message>,
    /// Authoritative node when the backend tracks one
    pub current_node: Option<NodeId>,
}

impl ServerHistory {
    /// Decode a GET response body.
    ///
    /// Shape: `{ data: [{ text, from | role }], currentNode? }`. A missing or
    /// non-array `data` means an empty transcript; a non-string
    /// `currentNode` is ignored.
    pub fn from_value(body: &Value) -> Self {
        let messages = body
            .get("data")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(decode_message).collect())
            .unwrap_or_default();

        let current_node = body
            .get("currentNode")
            .and_then(Value::as_str)
            .map(String::from);

        Self {
            messages,
            current_node,
        }
    }
}

fn decode_message(item: &Value) -> Message {
    let text = match item.get("text") {
        Some(Value::String(s)) => s.clone(),
        Some(v) if is_truthy(v) => v.to_string(),
        _ => String::new(),
    };

    // `from` wins when set, otherwise `role`
    let label = match item.get("from") {
        Some(from) if is_truthy(from) => from.as_str(),
        _ => item.get("role").and_then(Value::as_str),
    };

    Message {
        text,
        from: label.map_or(Sender::User, Sender::from_label),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
