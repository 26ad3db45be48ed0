//! Command-line interface definition for Chatline
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for interactive chat, the HTTP server, one-shot
//! scraping, conversation history and credential storage.

use clap::{Parser, Subcommand};

/// Chatline - terminal chat client for chat-completion endpoints
///
/// Conversations are persisted locally; `serve` hosts the scrape endpoint
/// and a completion proxy that keeps the API key off the client.
#[derive(Parser, Debug, Clone)]
#[command(name = "chatline")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the conversation database directory
    #[arg(long, env = "CHATLINE_STORAGE_PATH")]
    pub storage_path: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Chatline
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Reopen a stored conversation by its label
        #[arg(short, long)]
        resume: Option<String>,
    },

    /// Serve the scrape endpoint and the completion proxy
    Serve {
        /// Listen address, e.g. 127.0.0.1:3000
        #[arg(short, long)]
        addr: Option<String>,
    },

    /// Fetch a page and print its visible text
    Scrape {
        /// URL to scrape
        url: String,
    },

    /// Inspect and manage stored conversations
    History {
        /// History subcommand
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Store the completion API key in the OS keyring (read from stdin)
    Auth,
}

/// History management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum HistoryCommand {
    /// List stored conversations
    List,

    /// Print every message of a conversation
    Show {
        /// Conversation label, e.g. "Chat 1 - 5/14/2024"
        id: String,
    },

    /// Delete a conversation
    Delete {
        /// Conversation label
        id: String,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            storage_path: None,
            command: Commands::Chat { resume: None },
        }
    }
}
