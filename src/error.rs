//! Error types for Chatline
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Chatline operations
///
/// The completion, storage and session layers return this type directly
/// (see [`ChatResult`]) because their callers branch on the variant: a
/// cancelled request is silent, a network failure is shown to the user,
/// a storage failure degrades to in-memory operation.
#[derive(Error, Debug)]
pub enum ChatlineError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport failure or non-success status from the completion endpoint
    #[error("Network error: {0}")]
    Network(String),

    /// The in-flight request was cancelled by the user
    #[error("Request cancelled")]
    Cancelled,

    /// The completion endpoint answered with an unexpected payload
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Persistence read/write failures
    #[error("Storage error: {0}")]
    Storage(String),

    /// A completion request is already pending for this session
    #[error("A request is already in flight")]
    RequestInFlight,

    /// No message with the given id in the current conversation
    #[error("Message not found: {0}")]
    MessageNotFound(u64),

    /// No conversation with the given label in the index
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    /// `save_edit` was called outside of edit mode
    #[error("No message is being edited")]
    NotEditing,

    /// Scraping failures (invalid URL, blocked target, fetch or extraction)
    #[error("Scrape error: {0}")]
    Scrape(String),

    /// Rate limit exceeded for an operation
    #[error("Rate limit exceeded: limit={limit}, {message}")]
    RateLimitExceeded {
        /// The configured limit that was exceeded
        limit: u32,
        /// Additional message explaining the failure
        message: String,
    },

    /// Keyring/credential storage errors
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ChatlineError {
    /// Whether this error should be shown to the user.
    ///
    /// Cancellation is user-initiated and stays silent.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, ChatlineError::Cancelled)
    }
}

/// Result type alias for application-level operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

/// Result type alias for the completion, storage and session layers
pub type ChatResult<T> = std::result::Result<T, ChatlineError>;
