//! tutorchat
//!
//! Client-side session layer for the English-practice chat. This crate only
//! re-exports the workspace crates a consumer needs to drive a conversation:
//!
//! - [`core`]: wire protocol, identity, and the conversation log.
//! - [`realtime`]: the duplex transport channel.
//! - [`session`]: the session manager and the fallback request channel.

pub use tutorchat_core as core;
pub use tutorchat_realtime as realtime;
pub use tutorchat_session as session;
