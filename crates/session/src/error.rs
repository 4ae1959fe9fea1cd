use crate::fallback::FallbackError;
use tutorchat_core::APOLOGY_TEXT;

/// Shown when a live channel fails after it was open.
pub const CHANNEL_LOST_TEXT: &str =
    "The live connection was interrupted. Your next message will reconnect.";

/// Failures a session can run into.
///
/// `ConnectFailure`, `ChannelLost` and `SendFailure` are recovered inside the
/// session and surface as log records; `EmptyMessage` and `Terminated` are
/// returned to the caller.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Could not open the live channel: {0}")]
    ConnectFailure(String),
    #[error("Live channel failed after opening: {0}")]
    ChannelLost(String),
    #[error("Fallback request failed: {0}")]
    SendFailure(#[from] FallbackError),
    #[error("Message is empty")]
    EmptyMessage,
    #[error("Session has shut down")]
    Terminated,
}

impl SessionError {
    /// The line shown to the learner for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            SessionError::ChannelLost(_) => CHANNEL_LOST_TEXT,
            SessionError::ConnectFailure(_) | SessionError::SendFailure(_) => APOLOGY_TEXT,
            SessionError::EmptyMessage => "Please type a message first.",
            SessionError::Terminated => "This conversation has ended.",
        }
    }
}
