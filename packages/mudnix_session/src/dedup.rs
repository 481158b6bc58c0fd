//! Tracks which feed messages have already been shown.
//!
//! The feed channel replays the whole server-side queue on every push, so the
//! same message shows up in many payloads. Messages are equal when sender and
//! text are equal; two real messages with identical content are therefore
//! shown once.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "user")]
    pub sender: String,
    pub text: String,
}

impl Message {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.sender, self.text)
    }
}

/// Append-only record of displayed messages, in display order.
#[derive(Debug, Default)]
pub struct MessageDeduplicator {
    seen: Vec<Message>,
}

impl MessageDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_seen(&self, message: &Message) -> bool {
        self.seen.iter().any(|m| m == message)
    }

    /// Appends unconditionally. Check [`has_seen`](Self::has_seen) first.
    pub fn record(&mut self, message: Message) {
        self.seen.push(message);
    }

    /// Records `message` if it is new. Returns whether it should be displayed.
    pub fn observe(&mut self, message: &Message) -> bool {
        if self.has_seen(message) {
            return false;
        }
        self.record(message.clone());
        true
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
