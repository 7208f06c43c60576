//! Named side-effect handlers attached to tree options
//!
//! An option whose `action` names a registered handler runs that handler
//! instead of following `next`. The conversation moves to the end node once
//! the handler resolves, whether it succeeded or not.

use crate::tree::{DecisionOption, DecisionTree, NodeId};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Name of the handler every registry starts with
pub const NOOP_ACTION: &str = "noop";

/// Everything a handler sees about the selection that triggered it
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub option: DecisionOption,
    /// Node the option was selected from
    pub current_node: NodeId,
    /// Tree snapshot at selection time
    pub tree: Option<Arc<DecisionTree>>,
}

/// Failure reported by a handler. Logged, never shown to the user.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ActionError {
    pub message: String,
}

impl ActionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for ActionError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ActionError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn invoke(&self, ctx: ActionContext) -> Result<(), ActionError>;
}

struct Noop;

#[async_trait]
impl ActionHandler for Noop {
    async fn invoke(&self, _ctx: ActionContext) -> Result<(), ActionError> {
        Ok(())
    }
}

/// Adapter for closure handlers
struct FnHandler<F>(F);

#[async_trait]
impl<F> ActionHandler for FnHandler<F>
where
    F: Fn(ActionContext) -> BoxFuture<'static, Result<(), ActionError>> + Send + Sync,
{
    async fn invoke(&self, ctx: ActionContext) -> Result<(), ActionError> {
        (self.0)(ctx).await
    }
}

/// Action name to handler map
#[derive(Clone)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    /// Registry holding only the built-in `noop`
    pub fn new() -> Self {
        let mut handlers: HashMap<String, Arc<dyn ActionHandler>> = HashMap::new();
        handlers.insert(NOOP_ACTION.to_string(), Arc::new(Noop));
        Self { handlers }
    }

    /// Add or replace a handler
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    /// Register a closure returning a boxed future
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(ActionContext) -> BoxFuture<'static, Result<(), ActionError>>
            + Send
            + Sync
            + 'static,
    {
        self.register(name, Arc::new(FnHandler(f)));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}
