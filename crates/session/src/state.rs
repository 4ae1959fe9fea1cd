use serde::Serialize;
use std::fmt;

/// Where the session's duplex channel is in its lifecycle.
///
/// `Closed -> Connecting -> Open -> Closing -> Closed`. Only the session actor
/// changes it.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    #[default]
    Closed,
    Connecting,
    Open,
    Closing,
}

impl ChannelState {
    pub fn is_open(&self) -> bool {
        matches!(self, ChannelState::Open)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelState::Closed => write!(f, "closed"),
            ChannelState::Connecting => write!(f, "connecting"),
            ChannelState::Open => write!(f, "open"),
            ChannelState::Closing => write!(f, "closing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_closed() {
        assert_eq!(ChannelState::default(), ChannelState::Closed);
        assert!(!ChannelState::default().is_open());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ChannelState::Connecting.to_string(), "connecting");
        assert_eq!(ChannelState::Open.to_string(), "open");
    }
}
