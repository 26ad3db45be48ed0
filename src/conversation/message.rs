//! Chat message type and id generation

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of a message: milliseconds since the Unix epoch, bumped to stay
/// strictly increasing within a process.
pub type MessageId = u64;

static LAST_MESSAGE_ID: AtomicU64 = AtomicU64::new(0);

/// Generate a new time-based, monotonic message id
///
/// Uses the current wall clock in milliseconds. When the clock has not
/// advanced past the previously issued id (two messages in the same
/// millisecond, or the clock stepped backwards), the previous id plus one is
/// returned instead.
///
/// # Examples
///
/// ```
/// use chatline::conversation::next_message_id;
///
/// let a = next_message_id();
/// let b = next_message_id();
/// assert!(b > a);
/// ```
pub fn next_message_id() -> MessageId {
    let now = Utc::now().timestamp_millis().max(0) as u64;
    let mut last = LAST_MESSAGE_ID.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(last + 1);
        match LAST_MESSAGE_ID.compare_exchange_weak(
            last,
            candidate,
            Ordering::SeqCst,
            Ordering::Relaxed,
        ) {
            Ok(_) => return candidate,
            Err(actual) => last = actual,
        }
    }
}

/// Local wall-clock time formatted for display, e.g. `3:04:05 PM`
pub fn display_timestamp() -> String {
    Local::now().format("%-I:%M:%S %p").to_string()
}

/// One unit of dialogue, authored by the user or the assistant
///
/// Serialized with camelCase keys (`id`, `content`, `isUser`, `timestamp`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique, time-based id
    pub id: MessageId,
    /// Message text
    pub content: String,
    /// True when authored by the user
    pub is_user: bool,
    /// Display time of creation
    pub timestamp: String,
}

impl Message {
    /// Creates a new user message with a fresh id and timestamp
    ///
    /// # Examples
    ///
    /// ```
    /// use chatline::conversation::Message;
    ///
    /// let msg = Message::user("Hello");
    /// assert!(msg.is_user);
    /// assert_eq!(msg.content, "Hello");
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(content, true)
    }

    /// Creates a new assistant message with a fresh id and timestamp
    ///
    /// # Examples
    ///
    /// ```
    /// use chatline::conversation::Message;
    ///
    /// let msg = Message::assistant("Hi there");
    /// assert!(!msg.is_user);
    /// ```
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(content, false)
    }

    fn new(content: impl Into<String>, is_user: bool) -> Self {
        Self {
            id: next_message_id(),
            content: content.into(),
            is_user,
            timestamp: display_timestamp(),
        }
    }

    /// Role name used on the wire (`user` or `assistant`)
    pub fn role(&self) -> &'static str {
        if self.is_user {
            "user"
        } else {
            "assistant"
        }
    }
}
