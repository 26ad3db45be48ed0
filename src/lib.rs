//! Chatline - terminal chat client library
//!
//! This library provides the core functionality for Chatline: persisted
//! conversations, a cancellable remote completion client, the session
//! controller tying them together, and a small HTTP server with a page
//! scraper and a credential-holding completion proxy.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `conversation`: Messages, conversations and the conversation index
//! - `storage`: Key-value media and whole-index conversation persistence
//! - `completion`: Completion client trait and HTTP implementation
//! - `session`: Session controller (send, edit, cancel, conversation switching)
//! - `scrape`: Server-side page fetching and text extraction
//! - `server`: axum router for `/api/scrape` and `/api/chat`
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//! - `commands`: Handlers behind the CLI commands
//!
//! # Example
//!
//! ```no_run
//! use chatline::completion::create_client;
//! use chatline::storage::ConversationStore;
//! use chatline::{Config, SessionController};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let client = create_client(&config.completion, None)?;
//!     let store = ConversationStore::open("/tmp/chatline", &config.storage.index_key)?;
//!     let session = SessionController::new(client, store);
//!     session.send("Hello!").await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod completion;
pub mod config;
pub mod conversation;
pub mod error;
pub mod scrape;
pub mod server;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use completion::{CompletionClient, HttpCompletionClient};
pub use config::Config;
pub use conversation::{Conversation, ConversationIndex, Message};
pub use error::{ChatResult, ChatlineError, Result};
pub use session::{SendOutcome, SessionController};
pub use storage::ConversationStore;

#[cfg(test)]
pub mod test_utils;
