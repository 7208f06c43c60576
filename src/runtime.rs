//! Widget runtime
//!
//! One task per widget owns all mutable state. Host calls and background
//! completions both arrive as events on the same channel.

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::WidgetRuntime;

use crate::actions::ActionRegistry;
use crate::config::WidgetConfig;
use crate::presenter::Presenter;
use crate::state_machine::{Event, SessionState, Sender};
use crate::store::KeyValueStore;
use crate::sync::HttpChatTransport;
use crate::tree::{DecisionOption, HttpTreeSource};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Runtime wired to the HTTP tree source and chat transport
pub type HttpWidgetRuntime<K, P> = WidgetRuntime<K, HttpTreeSource, HttpChatTransport, P>;

impl<K, P> HttpWidgetRuntime<K, P>
where
    K: KeyValueStore + 'static,
    P: Presenter + 'static,
{
    /// Build a runtime talking to the URLs in `config`
    pub fn from_config(
        config: &WidgetConfig,
        store: K,
        presenter: P,
        actions: ActionRegistry,
    ) -> (Self, WidgetHandle) {
        let client = reqwest::Client::new();
        Self::new(
            config,
            store,
            config.tree_source(&client),
            config.chat_transport(&client),
            presenter,
            actions,
        )
    }
}

/// The runtime task has exited
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Widget runtime has stopped")]
pub struct RuntimeStopped;

/// Published copy of the widget after every processed event
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetSnapshot {
    pub session: SessionState,
    /// Empty until boot resolved it
    pub session_id: String,
    pub is_open: bool,
    pub has_tree: bool,
    /// Options of the current node
    pub options: Vec<DecisionOption>,
    pub sending: bool,
    /// Boot finished and events are being processed
    pub ready: bool,
}

impl WidgetSnapshot {
    fn initial(session: SessionState) -> Self {
        Self {
            session,
            session_id: String::new(),
            is_open: false,
            has_tree: false,
            options: Vec::new(),
            sending: false,
            ready: false,
        }
    }
}

/// Host-facing control surface of one widget
#[derive(Debug, Clone)]
pub struct WidgetHandle {
    event_tx: mpsc::UnboundedSender<Event>,
    snapshot_rx: watch::Receiver<WidgetSnapshot>,
    shutdown: CancellationToken,
}

impl WidgetHandle {
    fn send(&self, event: Event) -> Result<(), RuntimeStopped> {
        self.event_tx.send(event).map_err(|_| RuntimeStopped)
    }

    pub fn open(&self) -> Result<(), RuntimeStopped> {
        self.send(Event::Opened)
    }

    pub fn close(&self) -> Result<(), RuntimeStopped> {
        self.send(Event::Closed)
    }

    pub fn select_option(&self, option: DecisionOption) -> Result<(), RuntimeStopped> {
        self.send(Event::OptionSelected { option })
    }

    pub fn submit_text(&self, text: impl Into<String>) -> Result<(), RuntimeStopped> {
        self.send(Event::TextSubmitted { text: text.into() })
    }

    pub fn add_message(&self, text: impl Into<String>, from: Sender) -> Result<(), RuntimeStopped> {
        self.send(Event::MessageAdded {
            text: text.into(),
            from,
        })
    }

    pub fn snapshot(&self) -> WidgetSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WidgetSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Wait until a snapshot satisfies `predicate`. `None` on timeout or
    /// when the runtime stops first.
    pub async fn wait_for<F>(&self, predicate: F, timeout: Duration) -> Option<WidgetSnapshot>
    where
        F: FnMut(&WidgetSnapshot) -> bool,
    {
        let mut rx = self.snapshot_rx.clone();
        let result = tokio::time::timeout(timeout, rx.wait_for(predicate)).await;
        let snapshot = result.ok()?.ok().map(|s| WidgetSnapshot::clone(&s));
        snapshot
    }

    pub fn sending(&self) -> bool {
        self.snapshot_rx.borrow().sending
    }

    /// Stop the runtime and its polling task
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.event_tx.is_closed()
    }
}
