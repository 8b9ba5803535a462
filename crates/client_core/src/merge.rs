//! Merging of the three message sources for one conversation: the
//! fetched history, live relay events, and locally-originated optimistic
//! echoes.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use shared::domain::MessageId;
use shared::protocol::MessagePayload;

static PROVISIONAL_SEQ: AtomicU64 = AtomicU64::new(0);

/// Provisional id for an optimistic local echo, derived from the local
/// timestamp. The `local-` namespace is disjoint from server-assigned
/// ids, so an echo can never be collapsed against an unrelated server
/// message; the next full history replace supersedes it.
pub fn provisional_id() -> MessageId {
    let seq = PROVISIONAL_SEQ.fetch_add(1, Ordering::Relaxed);
    MessageId(format!("local-{}-{seq}", Utc::now().timestamp_millis()))
}

/// Append-ordered log of the selected conversation's messages.
///
/// Insertion order is preserved, oldest first; out-of-order delivery
/// from the transport is rendered out of order rather than re-sorted.
#[derive(Debug, Default)]
pub struct MessageLog {
    entries: Vec<MessagePayload>,
}

impl MessageLog {
    /// Replaces the whole log with a fetched history.
    pub fn replace(&mut self, history: Vec<MessagePayload>) {
        self.entries = history;
    }

    /// Appends one live or optimistic message.
    pub fn append(&mut self, message: MessagePayload) {
        self.entries.push(message);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Render-ready view: deduplicated by message id, first occurrence
    /// wins. Tolerates the same message arriving via both the optimistic
    /// echo and a later live or fetch path.
    pub fn snapshot(&self) -> Vec<MessagePayload> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|message| seen.insert(message.id.clone()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
#[path = "tests/merge_tests.rs"]
mod tests;
