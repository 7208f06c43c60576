//! Decision Chat - embeddable decision-tree chat widget core
//!
//! Walks a user through a remotely defined decision tree while mirroring the
//! conversation to an optional chat-history backend. The conversation engine
//! is a pure state machine; the runtime executes its effects against the
//! storage, tree, chat and presentation seams.

// Library surface; callers decide what to do with returned values
#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod actions;
pub mod config;
pub mod presenter;
pub mod runtime;
pub mod state_machine;
pub mod store;
pub mod sync;
pub mod tree;

pub use actions::{ActionContext, ActionError, ActionHandler, ActionRegistry};
pub use config::{ConfigOverrides, WidgetConfig};
pub use presenter::{AddMessage, CustomRenderer, Presenter, WidgetView};
pub use runtime::{WidgetHandle, WidgetRuntime, WidgetSnapshot};
pub use state_machine::{Message, Sender, SessionState};
pub use tree::{DecisionOption, DecisionTree, Node, NodeId};
