//! Session Manager
//!
//! Owns the lifecycle of one practice conversation: it opens the duplex
//! channel lazily, identifies the learner on every new connection, decides
//! which transport carries each message, and keeps the conversation log in
//! order.
//!
//! - `manager`: the session actor and the handle used to drive it.
//! - `fallback`: the one-shot HTTP request used when the channel is not open.
//! - `state`: the channel state machine's states.
//! - `error`: the session's failure taxonomy.

pub mod error;
pub mod fallback;
pub mod manager;
pub mod state;

pub use error::SessionError;
pub use fallback::{FallbackChannel, FallbackError, HttpFallback};
pub use manager::{CLOSED_TEXT, SETTLE_DELAY, SessionConfig, SessionHandle, SessionView};
pub use state::ChannelState;
