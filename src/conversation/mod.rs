//! Conversation data model
//!
//! - [`Message`]: one chat turn with a time-based id
//! - [`Conversation`]: ordered messages under a generated label
//! - [`ConversationIndex`]: every conversation, the unit of persistence

pub mod index;
pub mod message;

pub use index::{conversation_label, Conversation, ConversationIndex, ConversationSummary};
pub use message::{display_timestamp, next_message_id, Message, MessageId};

/// Local date formatted for conversation labels, e.g. `5/14/2024`
pub fn label_date() -> String {
    chrono::Local::now().format("%-m/%-d/%Y").to_string()
}
