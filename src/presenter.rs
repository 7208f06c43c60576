//! Presentation seam
//!
//! The runtime never draws anything itself. It hands a read-only view of the
//! widget to a [`Presenter`] whenever the transcript, the options, the open
//! flag or the sending indicator change.

mod terminal;

pub use terminal::TerminalPresenter;

use crate::state_machine::{Event, Message, Sender, WidgetState};
use crate::tree::{DecisionOption, DecisionTree};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Borrowed snapshot of what the widget should show
#[derive(Debug, Clone, Copy)]
pub struct WidgetView<'a> {
    pub history: &'a [Message],
    pub current_node: &'a str,
    /// Options of the current node; empty when the node or tree is missing
    pub options: &'a [DecisionOption],
    pub tree: Option<&'a DecisionTree>,
    pub is_open: bool,
}

impl<'a> WidgetView<'a> {
    pub fn from_state(state: &'a WidgetState) -> Self {
        Self {
            history: &state.session.history,
            current_node: &state.session.current_node,
            options: state.current_options(),
            tree: state.tree.as_deref(),
            is_open: state.is_open,
        }
    }
}

/// Capabilities a UI must provide
pub trait Presenter: Send + Sync {
    /// Redraw the transcript
    fn render_messages(&self, view: &WidgetView<'_>);

    /// Redraw the option buttons of the current node
    fn render_options(&self, view: &WidgetView<'_>);

    /// Show or hide the "sending" indicator
    fn set_sending(&self, sending: bool);

    /// Panel visibility changed
    fn set_open(&self, _open: bool) {}
}

impl<T: Presenter + ?Sized> Presenter for Arc<T> {
    fn render_messages(&self, view: &WidgetView<'_>) {
        (**self).render_messages(view);
    }

    fn render_options(&self, view: &WidgetView<'_>) {
        (**self).render_options(view);
    }

    fn set_sending(&self, sending: bool) {
        (**self).set_sending(sending);
    }

    fn set_open(&self, open: bool) {
        (**self).set_open(open);
    }
}

/// Host-supplied transcript renderer. When installed it replaces
/// [`Presenter::render_messages`]; options are still drawn by the presenter.
pub trait CustomRenderer: Send + Sync {
    fn render(&self, view: &WidgetView<'_>, add_message: &AddMessage);
}

impl<F> CustomRenderer for F
where
    F: Fn(&WidgetView<'_>, &AddMessage) + Send + Sync,
{
    fn render(&self, view: &WidgetView<'_>, add_message: &AddMessage) {
        self(view, add_message);
    }
}

/// Callback handed to a [`CustomRenderer`] for appending messages.
///
/// Messages are queued as events, so they land after the current render.
#[derive(Debug, Clone)]
pub struct AddMessage {
    event_tx: mpsc::UnboundedSender<Event>,
}

impl AddMessage {
    pub(crate) fn new(event_tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { event_tx }
    }

    pub fn add(&self, text: impl Into<String>, from: Sender) {
        let event = Event::MessageAdded {
            text: text.into(),
            from,
        };
        if self.event_tx.send(event).is_err() {
            tracing::debug!("Widget stopped, dropping added message");
        }
    }

    pub fn bot(&self, text: impl Into<String>) {
        self.add(text, Sender::Bot);
    }

    pub fn user(&self, text: impl Into<String>) {
        self.add(text, Sender::User);
    }
}
