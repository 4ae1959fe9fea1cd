//! Conversation Log
//!
//! An append-only, insertion-ordered record of everything shown to the
//! learner. Records are never edited after they are appended; consumers read
//! them through an immutable [`Snapshot`].

use crate::protocol::HistoryTurn;
use serde::Serialize;
use std::{fmt, sync::Arc};

/// Who a record is attributed to.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Agent,
    System,
    Error,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::User => write!(f, "user"),
            Speaker::Agent => write!(f, "agent"),
            Speaker::System => write!(f, "system"),
            Speaker::Error => write!(f, "error"),
        }
    }
}

/// Which path produced a record.
///
/// Local records are created by the session itself (the learner's own
/// messages, closure notices, failures); agent replies carry the transport
/// that delivered them.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Local,
    Channel,
    Fallback,
}

/// One line of the conversation.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ConversationRecord {
    sequence: u64,
    speaker: Speaker,
    text: String,
    origin: Origin,
}

impl ConversationRecord {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }
}

/// A read-only view of the log at one point in time.
pub type Snapshot = Arc<[ConversationRecord]>;

/// The log itself. Owned by exactly one session.
#[derive(Debug)]
pub struct ConversationLog {
    records: Vec<ConversationRecord>,
    next_sequence: u64,
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationLog {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            next_sequence: 1,
        }
    }

    /// Appends a record at the end of the log and returns it.
    pub fn append(
        &mut self,
        speaker: Speaker,
        text: impl Into<String>,
        origin: Origin,
    ) -> &ConversationRecord {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.records.push(ConversationRecord {
            sequence,
            speaker,
            text: text.into(),
            origin,
        });
        &self.records[self.records.len() - 1]
    }

    pub fn snapshot(&self) -> Snapshot {
        self.records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The learner and agent turns that precede `sequence`, oldest first.
    ///
    /// System and error records are not part of the dialogue and are left out.
    pub fn prior_turns(&self, sequence: u64) -> Vec<HistoryTurn> {
        self.records
            .iter()
            .take_while(|r| r.sequence < sequence)
            .filter_map(|r| match r.speaker {
                Speaker::User => Some(HistoryTurn::user(r.text.clone())),
                Speaker::Agent => Some(HistoryTurn::bot(r.text.clone())),
                Speaker::System | Speaker::Error => None,
            })
            .collect()
    }

    /// Discards every record and restarts numbering.
    pub fn reset(&mut self) {
        self.records.clear();
        self.next_sequence = 1;
    }
}
