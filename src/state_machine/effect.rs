//! Effects produced by state transitions

use crate::sync::MessageMeta;
use crate::tree::{DecisionOption, NodeId};

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Write the session snapshot to the persistent store
    PersistState,

    /// Re-render the transcript
    RenderMessages,

    /// Re-render the options of the current node
    RenderOptions,

    /// Mirror a message to the chat backend (fire-and-forget)
    SyncMessage {
        text: String,
        meta: MessageMeta,
        /// Node at the time the message was produced
        current_node: NodeId,
    },

    /// Run a registered custom action (spawns as background task)
    InvokeAction {
        action: String,
        option: DecisionOption,
        current_node: NodeId,
    },

    /// Load the server transcript (on open)
    FetchHistory,
}

impl Effect {
    pub fn sync_bot_message(text: impl Into<String>, node: impl Into<NodeId>) -> Self {
        let node = node.into();
        Effect::SyncMessage {
            text: text.into(),
            meta: MessageMeta::BotMessage { node: node.clone() },
            current_node: node,
        }
    }

    pub fn is_render(&self) -> bool {
        matches!(self, Effect::RenderMessages | Effect::RenderOptions)
    }
}
