//! Events that drive the decision engine

use super::state::{Message, Sender};
use crate::tree::{DecisionOption, DecisionTree, NodeId};
use std::sync::Arc;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    Opened,
    Closed,
    OptionSelected {
        option: DecisionOption,
    },
    TextSubmitted {
        text: String,
    },
    /// Appended through the custom renderer's callback
    MessageAdded {
        text: String,
        from: Sender,
    },

    // Background completions
    ActionFinished {
        action: String,
        outcome: ActionOutcome,
    },
    TreeChanged {
        tree: Arc<DecisionTree>,
    },
    /// Server transcript fetched; replaces local history wholesale.
    /// `seq` is the request's dispatch order, starting at 1.
    HistoryLoaded {
        seq: u64,
        messages: Vec<Message>,
        current_node: Option<NodeId>,
    },
    /// Open-time fetch was disabled or failed
    ServerHistoryUnavailable,
    SendFailed,
}

/// How a custom action ended. Either way the conversation moves on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed,
    Failed { error: String },
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Completed)
    }
}
