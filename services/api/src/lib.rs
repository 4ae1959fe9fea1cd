//! Tutorchat API Library Crate
//!
//! The reference remote endpoint for practice sessions: the duplex channel on
//! `/ws` and the fallback endpoint on `POST /api/chat`, both answered by the
//! configured `TutorAgent`. The `api` binary is a thin wrapper around this
//! library.

pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
pub mod ws;
