//! History sync client: gating, sending indicator, failure swallowing

use super::transport::{ChatTransport, SyncError};
use super::wire::{MessageMeta, OutgoingMessage, ServerHistory};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

/// Which parts of the chat backend are switched on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// False when no chat base URL is configured; nothing touches the network
    pub enabled: bool,
    /// Load the server transcript on open and after each send
    pub use_server_history: bool,
}

/// Result of a history fetch that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryFetch {
    /// Sync is disabled by configuration. A normal mode, not an error.
    Unavailable,
    Loaded(ServerHistory),
}

/// Result of mirroring one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Sync is disabled; nothing was sent
    Unavailable,
    /// The POST failed; already logged
    Failed,
    /// Accepted by the backend. `refreshed` holds the follow-up transcript
    /// when server history is enabled and the reload succeeded.
    Sent { refreshed: Option<ServerHistory> },
}

impl SendOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, SendOutcome::Sent { .. })
    }
}

// ============================================================================
// Sending Indicator
// ============================================================================

/// Publishes whether any send is in flight
#[derive(Debug, Clone)]
pub struct SendingIndicator {
    in_flight: Arc<Mutex<usize>>,
    tx: Arc<watch::Sender<bool>>,
}

impl SendingIndicator {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            in_flight: Arc::new(Mutex::new(0)),
            tx: Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn is_sending(&self) -> bool {
        *self.tx.borrow()
    }

    /// Mark a send as started. The flag clears when the guard drops.
    pub fn begin(&self) -> SendingGuard {
        self.adjust(true);
        SendingGuard {
            indicator: self.clone(),
        }
    }

    fn adjust(&self, starting: bool) {
        let mut count = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if starting {
            *count += 1;
        } else {
            *count = count.saturating_sub(1);
        }
        // Published under the lock so overlapping sends cannot reorder updates
        self.tx.send_replace(*count > 0);
    }
}

impl Default for SendingIndicator {
    fn default() -> Self {
        Self::new()
    }
}

/// Held for the duration of one send, including the follow-up reload
#[must_use = "the sending flag clears as soon as the guard is dropped"]
pub struct SendingGuard {
    indicator: SendingIndicator,
}

impl Drop for SendingGuard {
    fn drop(&mut self) {
        self.indicator.adjust(false);
    }
}

// ============================================================================
// Client
// ============================================================================

/// Chat backend client bound to one widget's settings
pub struct HistorySyncClient<T> {
    transport: T,
    settings: SyncSettings,
    sending: SendingIndicator,
}

impl<T: ChatTransport> HistorySyncClient<T> {
    pub fn new(transport: T, settings: SyncSettings) -> Self {
        Self {
            transport,
            settings,
            sending: SendingIndicator::new(),
        }
    }

    pub fn settings(&self) -> SyncSettings {
        self.settings
    }

    pub fn sending(&self) -> &SendingIndicator {
        &self.sending
    }

    /// Fetch the server transcript.
    ///
    /// `Unavailable` when sync or server history is switched off. Errors mean
    /// "could not sync"; callers fall back to local state.
    pub async fn fetch_history(&self, session_id: &str) -> Result<HistoryFetch, SyncError> {
        if !self.settings.enabled || !self.settings.use_server_history {
            return Ok(HistoryFetch::Unavailable);
        }
        let history = self.transport.get_messages(session_id).await?;
        tracing::debug!(
            session_id,
            messages = history.messages.len(),
            "Loaded server history"
        );
        Ok(HistoryFetch::Loaded(history))
    }

    /// Mirror a message to the backend. Never fails; see [`SendOutcome`].
    pub async fn send_message(
        &self,
        session_id: &str,
        text: &str,
        current_node: &str,
        meta: MessageMeta,
    ) -> SendOutcome {
        if !self.settings.enabled {
            return SendOutcome::Unavailable;
        }

        let _guard = self.sending.begin();

        let message = OutgoingMessage {
            thread_id: session_id.to_string(),
            text: text.to_string(),
            meta,
            current_node: current_node.to_string(),
        };
        if let Err(e) = self.transport.post_message(&message).await {
            tracing::warn!(session_id, error = %e, "Error sending message to chat API");
            return SendOutcome::Failed;
        }

        let refreshed = if self.settings.use_server_history {
            match self.transport.get_messages(session_id).await {
                Ok(history) => Some(history),
                Err(e) => {
                    tracing::warn!(session_id, error = %e, "Error reloading chat history after send");
                    None
                }
            }
        } else {
            None
        };

        SendOutcome::Sent { refreshed }
    }
}
