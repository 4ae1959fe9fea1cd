//! Terminal client for practice sessions.
//!
//! The `chat` binary reads learner lines from stdin, drives a session, and
//! prints each new record of the conversation as it appears.

pub mod config;
pub mod render;
