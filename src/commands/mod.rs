/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `chat`: Interactive chat session
- `serve`: HTTP server with the scrape endpoint and completion proxy
- `scrape`: One-shot page scrape
- `auth`: Store the completion API key in the OS keyring
- `history`: Inspect and manage stored conversations

The handlers stay small and delegate to the library components: the
session controller, the conversation store, the scraper and the server.
*/

use crate::config::Config;
use crate::error::{ChatlineError, Result};
use crate::storage::{default_storage_path, ConversationStore};
use std::path::PathBuf;

pub mod history;
pub mod render;
pub mod special_commands;

/// Resolve the conversation database directory from configuration
pub fn storage_path(config: &Config) -> Result<PathBuf> {
    match &config.storage.path {
        Some(path) => Ok(PathBuf::from(path)),
        None => Ok(default_storage_path()?),
    }
}

/// Open the configured sled-backed conversation store
///
/// # Errors
///
/// Returns `ChatlineError::Storage` if the database cannot be opened
pub fn open_store(config: &Config) -> Result<ConversationStore> {
    let path = storage_path(config)?;
    tracing::debug!("Opening conversation store at {}", path.display());
    Ok(ConversationStore::open(path, &config.storage.index_key)?)
}

// Chat command handler
pub mod chat {
    //! Interactive chat mode handler.
    //!
    //! Builds the completion client and the session controller, then runs a
    //! readline loop. While a reply is pending, Ctrl-C cancels the request
    //! instead of leaving the session.

    use super::render::{render_message, render_reply};
    use super::special_commands::{parse_special_command, print_help, SpecialCommand};
    use super::*;
    use crate::completion::create_client;
    use crate::config::resolve_api_key;
    use crate::error::ChatResult;
    use crate::session::{SendOutcome, SessionController};
    use crate::storage::MemoryStore;
    use colored::Colorize;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;
    use std::future::Future;
    use std::sync::Arc;

    /// Start interactive chat mode
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `resume` - Label of a stored conversation to reopen
    pub async fn run_chat(config: Config, resume: Option<String>) -> Result<()> {
        let client = create_client(&config.completion, resolve_api_key())?;

        let store = match open_store(&config) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!("Conversation store unavailable, history will not be saved: {}", e);
                eprintln!(
                    "{}",
                    format!("Warning: conversations will not be saved ({})", e).yellow()
                );
                ConversationStore::new(Arc::new(MemoryStore::new()))
            }
        };

        let session = SessionController::new(client, store);
        if let Some(error) = session.last_error() {
            eprintln!("{}", format!("Warning: {}", error).yellow());
        }

        if let Some(id) = &resume {
            session.select_conversation(id)?;
            print_conversation(&session);
        }

        let mut rl = DefaultEditor::new()?;
        print_welcome_banner(&config);

        loop {
            let prompt = format_prompt(&session);
            match rl.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(trimmed);

                    let command = match parse_special_command(trimmed) {
                        Ok(command) => command,
                        Err(e) => {
                            eprintln!("{}", e.to_string().red());
                            continue;
                        }
                    };

                    match command {
                        SpecialCommand::None => {
                            let outcome = wait_for_reply(&session, session.send(trimmed)).await;
                            report_outcome(outcome);
                        }
                        SpecialCommand::Edit { id, text } => {
                            if let Err(e) = session.edit(id, &text) {
                                eprintln!("{}", e.to_string().red());
                                continue;
                            }
                            let outcome = wait_for_reply(&session, session.save_edit()).await;
                            report_outcome(outcome);
                        }
                        SpecialCommand::NewChat => {
                            let id = session.new_chat();
                            println!("{}", format!("Started {}", id).green());
                        }
                        SpecialCommand::List => {
                            super::history::print_summaries(&session.conversations());
                        }
                        SpecialCommand::Open(id) => match session.select_conversation(&id) {
                            Ok(()) => print_conversation(&session),
                            Err(e) => eprintln!("{}", e.to_string().red()),
                        },
                        SpecialCommand::Delete(id) => match session.remove_conversation(&id) {
                            Ok(()) => println!("{}", format!("Deleted {}", id).green()),
                            Err(e) => eprintln!("{}", e.to_string().red()),
                        },
                        SpecialCommand::Show => print_conversation(&session),
                        SpecialCommand::Clear => {
                            session.clear_messages();
                            println!("{}", "Cleared. The stored conversation is kept.".dimmed());
                        }
                        SpecialCommand::Help => print_help(),
                        SpecialCommand::Exit => break,
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {:?}", err);
                    break;
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Await a request, cancelling it on Ctrl-C
    async fn wait_for_reply<F>(session: &SessionController, request: F) -> ChatResult<SendOutcome>
    where
        F: Future<Output = ChatResult<SendOutcome>>,
    {
        tokio::pin!(request);
        tokio::select! {
            result = &mut request => result,
            _ = tokio::signal::ctrl_c() => {
                session.cancel();
                request.await
            }
        }
    }

    fn report_outcome(outcome: ChatResult<SendOutcome>) {
        match outcome {
            Ok(SendOutcome::Replied(message)) => {
                println!("\n{}\n", render_reply(&message.content));
            }
            Ok(SendOutcome::Cancelled) => println!("{}", "Stopped.".yellow()),
            Ok(SendOutcome::Ignored) => {}
            Err(e) if e.is_user_visible() => eprintln!("{}\n", format!("Error: {}", e).red()),
            Err(_) => {}
        }
    }

    fn format_prompt(session: &SessionController) -> String {
        match session.active_conversation() {
            Some(id) => format!("[{}] >> ", id),
            None => ">> ".to_string(),
        }
    }

    fn print_conversation(session: &SessionController) {
        let messages = session.messages();
        if messages.is_empty() {
            println!("{}", "(no messages)".dimmed());
            return;
        }
        for message in &messages {
            println!("{}\n", render_message(message));
        }
    }

    /// Display welcome banner at the start of interactive chat mode
    fn print_welcome_banner(config: &Config) {
        println!();
        println!("{}", "Chatline".bold());
        println!("Model:  {}", config.completion.model.cyan());
        println!("Type {} for commands, {} to leave.", "/help".cyan(), "/exit".cyan());
        println!();
    }

}

/// Serve command
pub mod serve {
    use super::*;
    use crate::config::resolve_api_key;

    /// Run the HTTP server until Ctrl-C
    pub async fn run_serve(config: Config) -> Result<()> {
        crate::server::serve(&config, resolve_api_key()).await
    }
}

/// Scrape command
pub mod scrape {
    use super::*;
    use crate::scrape::Scraper;

    /// Scrape a single URL and print its text
    pub async fn run_scrape(config: Config, url: String) -> Result<()> {
        let scraper = Scraper::from_config(&config.server)?;
        let text = scraper.scrape(&url).await?;
        println!("{}", text);
        Ok(())
    }
}

/// Auth command
///
/// Reads the completion API key from stdin and stores it in the OS keyring,
/// where both `chat` and `serve` pick it up.
pub mod auth {
    use super::*;
    use crate::config::store_api_key;
    use colored::Colorize;
    use std::io::{BufRead, IsTerminal, Write};

    /// Read an API key from stdin and store it
    pub fn authenticate() -> Result<()> {
        let stdin = std::io::stdin();
        if stdin.is_terminal() {
            print!("Completion API key: ");
            std::io::stdout().flush()?;
        }

        let mut line = String::new();
        stdin.lock().read_line(&mut line)?;
        let key = parse_key(&line)?;

        store_api_key(&key)?;
        tracing::info!("Stored completion API key in keyring");
        println!("{}", "API key stored in the system keyring.".green());
        Ok(())
    }

    fn parse_key(line: &str) -> Result<String> {
        let key = line.trim();
        if key.is_empty() {
            return Err(ChatlineError::Config("API key cannot be empty".to_string()).into());
        }
        Ok(key.to_string())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_key_trims() {
            assert_eq!(parse_key("  hf_abc123\n").unwrap(), "hf_abc123");
        }

        #[test]
        fn test_parse_key_rejects_empty() {
            assert!(parse_key("\n").is_err());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_path_from_config() {
        let mut config = Config::default();
        config.storage.path = Some("/tmp/chatline-db".to_string());
        assert_eq!(
            storage_path(&config).unwrap(),
            PathBuf::from("/tmp/chatline-db")
        );
    }

    #[test]
    fn test_open_store_uses_configured_path_and_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.path = Some(dir.path().join("db").to_string_lossy().to_string());
        config.storage.index_key = "custom.key".to_string();

        let store = open_store(&config).unwrap();
        assert_eq!(store.key(), "custom.key");
        assert!(store.load_all().unwrap().is_empty());
    }
}
