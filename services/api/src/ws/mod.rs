//! WebSocket side of the reference endpoint.
//!
//! - `session`: one connection from the handshake frame to termination.

pub mod session;

pub use session::ws_handler;
