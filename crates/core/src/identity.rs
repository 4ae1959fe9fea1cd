use serde::{Deserialize, Serialize};

/// Who is speaking and in which language they want to practise.
///
/// Captured once when a session first connects and re-sent as the handshake
/// frame on every new channel, since the remote endpoint keeps no state
/// across connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub display_name: String,
    pub preferred_language: String,
}

impl SessionIdentity {
    pub fn new(display_name: impl Into<String>, preferred_language: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            preferred_language: preferred_language.into(),
        }
    }
}

/// Supplies the identity for a session at the moment it first connects.
///
/// Profiles live outside this workspace; implementors adapt whatever store
/// holds them. A plain `SessionIdentity` is its own source.
pub trait IdentitySource: Send + Sync {
    fn current_identity(&self) -> SessionIdentity;
}

impl IdentitySource for SessionIdentity {
    fn current_identity(&self) -> SessionIdentity {
        self.clone()
    }
}
