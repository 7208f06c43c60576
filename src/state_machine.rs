//! Decision engine state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.
//! The runtime feeds events in and executes the returned effects.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use event::{ActionOutcome, Event};
pub use state::{EngineContext, Message, Sender, SessionState, WidgetState};
pub use transition::{transition, TransitionError, TransitionResult};
