//! Decision tree model and provider
//!
//! The tree is fetched once at boot and then refreshed by a polling task.
//! Refreshes replace the whole tree; nodes are never patched in place.

mod provider;
mod source;

pub use provider::{PollHandle, TreeProvider};
pub use source::{HttpTreeSource, TreeError, TreeSource};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of a node in the decision tree
pub type NodeId = String;

/// Terminal node every successful or failed action ends in
pub const END_NODE: &str = "end";

/// One conversational step: a bot prompt and the choices offered after it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub options: Vec<DecisionOption>,
}

/// A user-selectable choice attached to a node.
///
/// When both `action` and `next` are set and the action is registered, the
/// action wins and the conversation ends at [`END_NODE`]; `next` is ignored.
/// Trees relying on both fields at once are probably misconfigured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionOption {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl DecisionOption {
    pub fn goto(text: impl Into<String>, next: impl Into<NodeId>) -> Self {
        Self {
            text: text.into(),
            next: Some(next.into()),
            action: None,
        }
    }

    pub fn run(text: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            next: None,
            action: Some(action.into()),
        }
    }
}

/// Mapping from node id to node, as served by the tree endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionTree {
    nodes: BTreeMap<NodeId, Node>,
}

impl DecisionTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests and static trees
    #[must_use]
    pub fn with_node(mut self, id: impl Into<NodeId>, node: Node) -> Self {
        self.nodes.insert(id.into(), node);
        self
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Options offered at `id`, empty when the node is missing
    pub fn options_at(&self, id: &str) -> &[DecisionOption] {
        self.nodes.get(id).map_or(&[], |n| n.options.as_slice())
    }

    /// Canonical JSON form used for change detection.
    ///
    /// Keys are ordered, so two trees with the same content always produce
    /// the same string regardless of the key order the server used.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl FromIterator<(NodeId, Node)> for DecisionTree {
    fn from_iter<I: IntoIterator<Item = (NodeId, Node)>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
        }
    }
}
