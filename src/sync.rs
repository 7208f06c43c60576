//! Chat history synchronization
//!
//! Mirrors the conversation to an optional chat backend. Every failure here
//! is reported as a value (`HistoryFetch`, `SendOutcome`); callers fall back
//! to local state and the conversation keeps going.

mod client;
mod transport;
mod wire;

pub use client::{
    HistoryFetch, HistorySyncClient, SendOutcome, SendingGuard, SendingIndicator, SyncSettings,
};
pub use transport::{join_url, ChatTransport, HttpChatTransport, SyncError};
pub use wire::{MessageMeta, OutgoingMessage, ServerHistory};
