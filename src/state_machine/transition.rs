//! Pure state transition function
//!
//! Given the same state, context and event this always produces the same
//! new state and effects. No I/O happens here.

use super::state::{EngineContext, Message, WidgetState};
use super::{Effect, Event};
use crate::sync::MessageMeta;
use crate::tree::{DecisionOption, DecisionTree, END_NODE};
use std::sync::Arc;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: WidgetState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: WidgetState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Events the engine refuses. These are no-ops, not failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("No decision tree loaded yet")]
    TreeUnavailable,
    #[error("Message is empty")]
    EmptyMessage,
    #[error("History refresh {seq} is older than applied refresh {applied}")]
    StaleHistory { seq: u64, applied: u64 },
}

/// Pure transition function
pub fn transition(
    state: &WidgetState,
    context: &EngineContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match event {
        // ============================================================
        // Open / Close
        // ============================================================
        Event::Opened => {
            let mut next = state.clone();
            next.is_open = true;
            let renders = renders(&next, true, true);
            Ok(TransitionResult::new(next)
                .with_effects(renders)
                .with_effect(Effect::FetchHistory))
        }

        Event::Closed => {
            let mut next = state.clone();
            next.is_open = false;
            Ok(TransitionResult::new(next).with_effect(Effect::PersistState))
        }

        // ============================================================
        // User input
        // ============================================================
        Event::OptionSelected { option } => select_option(state, context, option),

        Event::TextSubmitted { text } => {
            let clean = text.trim();
            if clean.is_empty() {
                return Err(TransitionError::EmptyMessage);
            }
            let current_node = state.session.current_node.clone();
            let mut next = state.clone();
            next.session.history.push(Message::user(clean));
            let renders = renders(&next, true, false);
            Ok(TransitionResult::new(next)
                .with_effect(Effect::PersistState)
                .with_effects(renders)
                .with_effect(Effect::SyncMessage {
                    text: clean.to_string(),
                    meta: MessageMeta::FreeText {
                        current_node: current_node.clone(),
                    },
                    current_node,
                }))
        }

        Event::MessageAdded { text, from } => {
            let mut next = state.clone();
            next.session.history.push(Message { text, from });
            let renders = renders(&next, true, false);
            Ok(TransitionResult::new(next)
                .with_effect(Effect::PersistState)
                .with_effects(renders))
        }

        // ============================================================
        // Background completions
        // ============================================================

        // Success or failure, an action always ends the conversation
        Event::ActionFinished { .. } => {
            let message = state
                .tree
                .as_deref()
                .and_then(|t| t.get(END_NODE))
                .map(|n| n.message.as_str())
                .filter(|m| !m.is_empty())
                .unwrap_or(&context.end_fallback_message)
                .to_string();

            let mut next = state.clone();
            next.session.current_node = END_NODE.to_string();
            next.session.history.push(Message::bot(&message));
            let renders = renders(&next, true, true);
            Ok(TransitionResult::new(next)
                .with_effect(Effect::PersistState)
                .with_effect(Effect::sync_bot_message(message, END_NODE))
                .with_effects(renders))
        }

        // Reconcile before anything re-renders against the new tree
        Event::TreeChanged { tree } => Ok(replace_tree(state, context, tree)),

        // Replies can land out of order; only the newest request counts
        Event::HistoryLoaded {
            seq,
            messages,
            current_node,
        } => {
            if seq <= state.history_seq {
                return Err(TransitionError::StaleHistory {
                    seq,
                    applied: state.history_seq,
                });
            }
            let mut next = state.clone();
            next.history_seq = seq;
            next.session.history = messages;
            if let Some(node) = current_node {
                next.session.current_node = node;
            }
            let renders = renders(&next, true, true);
            Ok(TransitionResult::new(next)
                .with_effect(Effect::PersistState)
                .with_effects(renders))
        }

        // Seed the greeting only for a fresh local conversation
        Event::ServerHistoryUnavailable => {
            let mut next = state.clone();
            let mut effects = vec![];
            if next.session.history.is_empty() {
                if let Some(greeting) = state.current_message().filter(|m| !m.is_empty()) {
                    next.session.history.push(Message::bot(greeting));
                    effects.push(Effect::PersistState);
                }
            }
            effects.extend(renders(&next, true, true));
            Ok(TransitionResult::new(next).with_effects(effects))
        }

        Event::SendFailed => {
            let mut next = state.clone();
            next.session
                .history
                .push(Message::bot(&context.send_failure_message));
            let renders = renders(&next, true, false);
            Ok(TransitionResult::new(next)
                .with_effect(Effect::PersistState)
                .with_effects(renders))
        }
    }
}

fn select_option(
    state: &WidgetState,
    context: &EngineContext,
    option: DecisionOption,
) -> Result<TransitionResult, TransitionError> {
    let tree = state.tree.clone().ok_or(TransitionError::TreeUnavailable)?;
    let from_node = state.session.current_node.clone();

    let mut next = state.clone();
    next.session.history.push(Message::user(&option.text));

    let mut effects = vec![Effect::PersistState];
    effects.extend(renders(&next, true, false));
    effects.push(Effect::SyncMessage {
        text: option.text.clone(),
        meta: MessageMeta::DecisionOption {
            current_node: from_node.clone(),
            option: option.clone(),
        },
        current_node: from_node.clone(),
    });

    // A registered action takes precedence over `next`
    if let Some(action) = option.action.as_deref().filter(|a| context.has_action(a)) {
        effects.push(Effect::InvokeAction {
            action: action.to_string(),
            option: option.clone(),
            current_node: from_node,
        });
        return Ok(TransitionResult::new(next).with_effects(effects));
    }

    if let Some(target) = option.next.as_deref().filter(|n| tree.contains(n)) {
        next.session.current_node = target.to_string();
        let message = tree.get(target).map(|n| n.message.clone()).unwrap_or_default();
        effects.push(Effect::PersistState);
        if !message.is_empty() {
            next.session.history.push(Message::bot(&message));
            effects.push(Effect::sync_bot_message(message, target));
        }
        effects.extend(renders(&next, true, true));
        return Ok(TransitionResult::new(next).with_effects(effects));
    }

    // Dead end: stay put, show the same options again
    effects.extend(renders(&next, false, true));
    Ok(TransitionResult::new(next).with_effects(effects))
}

fn replace_tree(
    state: &WidgetState,
    context: &EngineContext,
    tree: Arc<DecisionTree>,
) -> TransitionResult {
    let mut next = state.clone();
    let mut effects = vec![];
    if !tree.contains(&next.session.current_node) {
        next.session.current_node.clone_from(&context.initial_node);
        effects.push(Effect::PersistState);
    }
    next.tree = Some(tree);
    effects.extend(renders(&next, true, true));
    TransitionResult::new(next).with_effects(effects)
}

/// Render effects, only while the panel is open
fn renders(state: &WidgetState, messages: bool, options: bool) -> Vec<Effect> {
    if !state.is_open {
        return vec![];
    }
    let mut effects = Vec::with_capacity(2);
    if messages {
        effects.push(Effect::RenderMessages);
    }
    if options {
        effects.push(Effect::RenderOptions);
    }
    effects
}
