//! Defines the frames exchanged with the remote conversational agent.
//!
//! Two transports carry the same conversation: the duplex channel, which
//! speaks small JSON text frames, and the fallback HTTP endpoint, which takes
//! one request body and returns one response body per message.

use crate::identity::SessionIdentity;
use serde::{Deserialize, Serialize};

/// Errors raised while decoding an inbound channel frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Frame carries neither a user echo nor an agent reply")]
    EmptyFrame,
}

// --- Duplex channel frames ---

/// The first frame sent on every freshly opened channel.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HandshakeFrame {
    pub name: String,
    pub language: String,
}

impl From<&SessionIdentity> for HandshakeFrame {
    fn from(identity: &SessionIdentity) -> Self {
        Self {
            name: identity.display_name.clone(),
            language: identity.preferred_language.clone(),
        }
    }
}

/// A single user message sent over an open channel.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MessageFrame {
    pub user: String,
}

/// Frames the client writes to the channel.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum OutboundFrame {
    Handshake(HandshakeFrame),
    Message(MessageFrame),
}

impl OutboundFrame {
    pub fn handshake(identity: &SessionIdentity) -> Self {
        Self::Handshake(identity.into())
    }

    pub fn message(text: impl Into<String>) -> Self {
        Self::Message(MessageFrame { user: text.into() })
    }

    /// Serializes the frame into the JSON text sent on the wire.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// The raw shape of an inbound frame. Either key may be missing.
#[derive(Serialize, Deserialize, Debug, Default)]
struct WireInbound {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bot: Option<String>,
}

/// A decoded inbound frame.
///
/// `user` echoes or confirms what the learner said, `bot` carries the agent's
/// reply; one frame may carry both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Echo { user: String },
    Reply { bot: String },
    EchoAndReply { user: String, bot: String },
}

impl InboundFrame {
    /// Decodes a text frame received from the channel.
    ///
    /// Empty strings count as absent, so `{"bot": ""}` is an empty frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let wire: WireInbound = serde_json::from_str(text)?;
        let user = wire.user.filter(|s| !s.is_empty());
        let bot = wire.bot.filter(|s| !s.is_empty());
        match (user, bot) {
            (Some(user), Some(bot)) => Ok(Self::EchoAndReply { user, bot }),
            (Some(user), None) => Ok(Self::Echo { user }),
            (None, Some(bot)) => Ok(Self::Reply { bot }),
            (None, None) => Err(ProtocolError::EmptyFrame),
        }
    }

    /// Serializes the frame the way the server writes it.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let wire = match self {
            Self::Echo { user } => WireInbound {
                user: Some(user.clone()),
                bot: None,
            },
            Self::Reply { bot } => WireInbound {
                user: None,
                bot: Some(bot.clone()),
            },
            Self::EchoAndReply { user, bot } => WireInbound {
                user: Some(user.clone()),
                bot: Some(bot.clone()),
            },
        };
        serde_json::to_string(&wire)
    }

    pub fn echo(&self) -> Option<&str> {
        match self {
            Self::Echo { user } | Self::EchoAndReply { user, .. } => Some(user.as_str()),
            Self::Reply { .. } => None,
        }
    }

    pub fn reply(&self) -> Option<&str> {
        match self {
            Self::Reply { bot } | Self::EchoAndReply { bot, .. } => Some(bot.as_str()),
            Self::Echo { .. } => None,
        }
    }
}

// --- Fallback HTTP bodies ---

/// Who said a prior turn, as seen by the fallback endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HistorySender {
    User,
    Bot,
}

/// One earlier turn of the conversation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HistoryTurn {
    pub sender: HistorySender,
    pub text: String,
}

impl HistoryTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: HistorySender::User,
            text: text.into(),
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            sender: HistorySender::Bot,
            text: text.into(),
        }
    }
}

/// Body of the fallback `POST`. Carries the same logical payload as the
/// channel: the message, who sent it, and the turns before it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FallbackRequest {
    pub message: String,
    pub user_name: String,
    pub language: String,
    pub conversation_history: Vec<HistoryTurn>,
}

impl FallbackRequest {
    pub fn new(
        message: impl Into<String>,
        identity: &SessionIdentity,
        conversation_history: Vec<HistoryTurn>,
    ) -> Self {
        Self {
            message: message.into(),
            user_name: identity.display_name.clone(),
            language: identity.preferred_language.clone(),
            conversation_history,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FallbackData {
    pub response: String,
}

/// Body returned by the fallback endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FallbackResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<FallbackData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FallbackResponse {
    pub fn reply(response: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(FallbackData {
                response: response.into(),
            }),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Collapses the body into the reply text or the server's error message.
    pub fn into_result(self) -> Result<String, String> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data.response),
            (true, None) => Err("response body carried no data".to_string()),
            (false, _) => Err(self
                .error
                .unwrap_or_else(|| "server reported failure without a message".to_string())),
        }
    }
}
