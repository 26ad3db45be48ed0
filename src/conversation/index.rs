//! Conversation index: every stored conversation, keyed by label
//!
//! The index is the single persisted source of truth. It serializes as a
//! JSON object mapping each conversation label to its array of messages,
//! keeping insertion order so that loading and re-saving an unmodified index
//! produces identical bytes. The sidebar listing is derived from it through
//! [`ConversationIndex::summaries`].

use super::message::{Message, MessageId};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Maximum number of characters of the first user message used as a title
const TITLE_CHARS: usize = 20;

/// Title shown for conversations without any user message
const UNTITLED: &str = "No title";

/// An ordered, persisted sequence of chat turns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    /// Generated label, e.g. `Chat 1 - 5/14/2024`
    pub id: String,
    /// Messages in display and turn order
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Create an empty conversation with the given label
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
        }
    }

    /// Short title derived from the first user message
    ///
    /// # Examples
    ///
    /// ```
    /// use chatline::conversation::{Conversation, Message};
    ///
    /// let mut conversation = Conversation::new("Chat 1 - 1/1/2024");
    /// assert_eq!(conversation.title(), "No title");
    ///
    /// conversation.messages.push(Message::user("How do lifetimes work in Rust?"));
    /// assert_eq!(conversation.title(), "How do lifetimes wor");
    /// ```
    pub fn title(&self) -> String {
        self.messages
            .iter()
            .find(|m| m.is_user && !m.content.trim().is_empty())
            .map(|m| m.content.chars().take(TITLE_CHARS).collect())
            .unwrap_or_else(|| UNTITLED.to_string())
    }
}

/// Listing entry for a stored conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationSummary {
    /// Conversation label
    pub id: String,
    /// Derived title
    pub title: String,
    /// Number of messages in the conversation
    pub message_count: usize,
}

/// Mapping from conversation label to conversation, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationIndex {
    conversations: Vec<Conversation>,
}

impl ConversationIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of conversations
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// Whether the index holds no conversations
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Look up a conversation by label
    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    /// Whether a conversation with this label exists
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Iterate conversations in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Conversation> {
        self.conversations.iter()
    }

    /// Insert a conversation, replacing the messages of an existing one with
    /// the same label in place (its position is kept)
    pub fn insert(&mut self, conversation: Conversation) {
        match self.get_mut(&conversation.id) {
            Some(existing) => existing.messages = conversation.messages,
            None => self.conversations.push(conversation),
        }
    }

    /// Remove a conversation by label
    pub fn remove(&mut self, id: &str) -> Option<Conversation> {
        let pos = self.conversations.iter().position(|c| c.id == id)?;
        Some(self.conversations.remove(pos))
    }

    /// Create an empty conversation labelled `Chat {n} - {date}` and return
    /// its label
    ///
    /// `n` starts at one more than the current number of conversations and is
    /// bumped until the label is unused.
    ///
    /// # Examples
    ///
    /// ```
    /// use chatline::conversation::ConversationIndex;
    ///
    /// let mut index = ConversationIndex::new();
    /// let first = index.create_conversation("5/14/2024");
    /// let second = index.create_conversation("5/14/2024");
    /// assert_eq!(first, "Chat 1 - 5/14/2024");
    /// assert_eq!(second, "Chat 2 - 5/14/2024");
    /// ```
    pub fn create_conversation(&mut self, date: &str) -> String {
        let mut ordinal = self.conversations.len() + 1;
        let mut label = conversation_label(ordinal, date);
        while self.contains(&label) {
            ordinal += 1;
            label = conversation_label(ordinal, date);
        }
        self.conversations.push(Conversation::new(label.clone()));
        label
    }

    /// Append a message to a conversation, creating the conversation if it
    /// does not exist yet
    pub fn append_message(&mut self, id: &str, message: Message) {
        match self.get_mut(id) {
            Some(conversation) => conversation.messages.push(message),
            None => {
                let mut conversation = Conversation::new(id);
                conversation.messages.push(message);
                self.conversations.push(conversation);
            }
        }
    }

    /// Replace the content of a stored message; returns whether it was found
    pub fn replace_content(&mut self, id: &str, message_id: MessageId, content: &str) -> bool {
        let Some(message) = self
            .get_mut(id)
            .and_then(|c| c.messages.iter_mut().find(|m| m.id == message_id))
        else {
            return false;
        };
        message.content = content.to_string();
        true
    }

    /// Listing view derived from the stored conversations
    pub fn summaries(&self) -> Vec<ConversationSummary> {
        self.conversations
            .iter()
            .map(|c| ConversationSummary {
                id: c.id.clone(),
                title: c.title(),
                message_count: c.messages.len(),
            })
            .collect()
    }
}

/// Build a conversation label from an ordinal and a display date
pub fn conversation_label(ordinal: usize, date: &str) -> String {
    format!("Chat {} - {}", ordinal, date)
}

impl Serialize for ConversationIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.conversations.len()))?;
        for conversation in &self.conversations {
            map.serialize_entry(&conversation.id, &conversation.messages)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ConversationIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IndexVisitor;

        impl<'de> Visitor<'de> for IndexVisitor {
            type Value = ConversationIndex;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of conversation labels to message arrays")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut index = ConversationIndex::new();
                while let Some((id, messages)) = access.next_entry::<String, Vec<Message>>()? {
                    index.insert(Conversation { id, messages });
                }
                Ok(index)
            }
        }

        deserializer.deserialize_map(IndexVisitor)
    }
}
