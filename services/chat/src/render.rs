//! Turns conversation records into terminal lines.

use tutorchat_core::conversation::{ConversationRecord, Origin, Speaker};

pub fn format_record(record: &ConversationRecord) -> String {
    match (record.speaker(), record.origin()) {
        (Speaker::User, _) => format!("you> {}", record.text()),
        (Speaker::Agent, Origin::Fallback) => format!("tutor (http)> {}", record.text()),
        (Speaker::Agent, _) => format!("tutor> {}", record.text()),
        (Speaker::System, _) => format!("-- {} --", record.text()),
        (Speaker::Error, _) => format!("!! {}", record.text()),
    }
}

/// Remembers how far into the log it has printed.
#[derive(Debug, Default)]
pub struct RecordPrinter {
    epoch: u64,
    last_sequence: u64,
}

impl RecordPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines for the records of `epoch` not printed yet.
    ///
    /// A new epoch means the log was reset, so it is printed from the top.
    pub fn take_new(&mut self, epoch: u64, records: &[ConversationRecord]) -> Vec<String> {
        if epoch != self.epoch {
            self.epoch = epoch;
            self.last_sequence = 0;
        }
        let lines = records
            .iter()
            .filter(|r| r.sequence() > self.last_sequence)
            .map(format_record)
            .collect();
        if let Some(newest) = records.last() {
            self.last_sequence = self.last_sequence.max(newest.sequence());
        }
        lines
    }
}
