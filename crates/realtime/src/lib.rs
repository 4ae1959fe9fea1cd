//! Transport Channel
//!
//! A duplex, message-oriented connection to the remote conversational agent.
//! The channel reports its lifecycle through [`ChannelEvent`]s pushed into a
//! queue supplied by whoever opened it:
//!
//! - `channel`: the `Transport` and `ChannelHandle` seams and the event type.
//! - `websocket`: the implementation over `tokio-tungstenite`.

pub mod channel;
pub mod websocket;

pub use channel::{ChannelError, ChannelEvent, ChannelEventSender, ChannelHandle, Transport};
pub use websocket::WsTransport;
