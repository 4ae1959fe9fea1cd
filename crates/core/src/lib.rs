//! Core types shared by every part of the practice chat: the wire protocol
//! spoken over the duplex channel and the fallback endpoint, the learner's
//! session identity, the conversation log, and the tutor abstraction used by
//! the reference server.

pub mod conversation;
pub mod identity;
pub mod protocol;
pub mod tutor;

/// The line shown to the learner whenever a reply could not be produced.
pub const APOLOGY_TEXT: &str = "Sorry, I encountered an error. Please try again.";
