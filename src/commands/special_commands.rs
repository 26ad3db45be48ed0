//! Special commands parser for interactive chat mode
//!
//! Special commands manage conversations and edits instead of being sent to
//! the model. They are prefixed with `/`; the command word is
//! case-insensitive, arguments keep their case.

use crate::conversation::MessageId;
use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an unsupported argument
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed during interactive chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Start a new, empty conversation
    NewChat,
    /// List stored conversations
    List,
    /// Open a stored conversation by label
    Open(String),
    /// Delete a stored conversation by label
    Delete(String),
    /// Reprint the current conversation with message ids
    Show,
    /// Replace a message's content and ask again
    Edit { id: MessageId, text: String },
    /// Clear the on-screen conversation (the stored copy is kept)
    Clear,
    /// Display help information
    Help,
    /// Exit the session
    Exit,
    /// Not a special command; send as a chat message
    None,
}

fn missing(command: &str, usage: &str) -> CommandError {
    CommandError::MissingArgument {
        command: command.to_string(),
        usage: usage.to_string(),
    }
}

/// Parse user input into a special command
///
/// Returns `SpecialCommand::None` for regular chat input.
///
/// # Errors
///
/// Returns `CommandError` for unknown commands or bad arguments
///
/// # Examples
///
/// ```
/// use chatline::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(parse_special_command("/new").unwrap(), SpecialCommand::NewChat);
/// assert_eq!(parse_special_command("hello").unwrap(), SpecialCommand::None);
/// assert_eq!(
///     parse_special_command("/open Chat 1 - 5/14/2024").unwrap(),
///     SpecialCommand::Open("Chat 1 - 5/14/2024".to_string())
/// );
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if !trimmed.starts_with('/') {
        return Ok(match lower.as_str() {
            "exit" | "quit" => SpecialCommand::Exit,
            _ => SpecialCommand::None,
        });
    }

    let (word, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((word, rest)) => (word.to_lowercase(), rest.trim()),
        None => (lower.clone(), ""),
    };

    match word.as_str() {
        "/new" => Ok(SpecialCommand::NewChat),
        "/list" | "/history" => Ok(SpecialCommand::List),
        "/show" => Ok(SpecialCommand::Show),
        "/clear" => Ok(SpecialCommand::Clear),
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/exit" | "/quit" => Ok(SpecialCommand::Exit),

        "/open" if rest.is_empty() => Err(missing("/open", "/open <conversation>")),
        "/open" => Ok(SpecialCommand::Open(rest.to_string())),

        "/delete" if rest.is_empty() => Err(missing("/delete", "/delete <conversation>")),
        "/delete" => Ok(SpecialCommand::Delete(rest.to_string())),

        "/edit" => {
            let usage = "/edit <message-id> <new text>";
            let (id, text) = match rest.split_once(char::is_whitespace) {
                Some((id, text)) if !text.trim().is_empty() => (id, text.trim()),
                _ => return Err(missing("/edit", usage)),
            };
            let id = id.parse::<MessageId>().map_err(|_| CommandError::UnsupportedArgument {
                command: "/edit".to_string(),
                arg: id.to_string(),
            })?;
            Ok(SpecialCommand::Edit {
                id,
                text: text.to_string(),
            })
        }

        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

/// Print help for special commands
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat
=====================================

CONVERSATIONS:
  /new                 - Start a new conversation
  /list                - List stored conversations
  /open <conversation> - Open a stored conversation, e.g. /open Chat 1 - 5/14/2024
  /delete <conversation> - Delete a stored conversation

MESSAGES:
  /show                - Reprint the conversation with message ids
  /edit <id> <text>    - Replace a message and ask again
  /clear               - Clear the screen copy of the conversation

SESSION CONTROL:
  /help                - Show this help message
  /?                   - Same as /help
  /exit, exit, quit    - Exit interactive mode
  Ctrl-C               - Stop waiting for a reply (while one is pending)

NOTES:
  - Command words are case-insensitive
  - Regular text (not starting with /) is sent to the model
  - /clear keeps the stored conversation; use /open to bring it back
"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_regular_input() {
        assert_eq!(parse_special_command("hello").unwrap(), SpecialCommand::None);
        assert_eq!(
            parse_special_command("what does /new do?").unwrap(),
            SpecialCommand::None
        );
    }

    #[test]
    fn test_parse_exit_variants() {
        for input in ["exit", "QUIT", "/exit", "/Quit", "  exit  "] {
            assert_eq!(parse_special_command(input).unwrap(), SpecialCommand::Exit);
        }
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_special_command("/new").unwrap(), SpecialCommand::NewChat);
        assert_eq!(parse_special_command("/LIST").unwrap(), SpecialCommand::List);
        assert_eq!(parse_special_command("/show").unwrap(), SpecialCommand::Show);
        assert_eq!(parse_special_command("/clear").unwrap(), SpecialCommand::Clear);
        assert_eq!(parse_special_command("/?").unwrap(), SpecialCommand::Help);
    }

    #[test]
    fn test_parse_open_keeps_argument_case() {
        assert_eq!(
            parse_special_command("/Open   Chat 2 - 12/1/2024 ").unwrap(),
            SpecialCommand::Open("Chat 2 - 12/1/2024".to_string())
        );
    }

    #[test]
    fn test_parse_open_and_delete_require_argument() {
        assert!(matches!(
            parse_special_command("/open"),
            Err(CommandError::MissingArgument { .. })
        ));
        assert!(matches!(
            parse_special_command("/delete   "),
            Err(CommandError::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_parse_edit() {
        assert_eq!(
            parse_special_command("/edit 1715700000000 Explain Rust traits").unwrap(),
            SpecialCommand::Edit {
                id: 1715700000000,
                text: "Explain Rust traits".to_string()
            }
        );
    }

    #[test]
    fn test_parse_edit_errors() {
        assert!(matches!(
            parse_special_command("/edit"),
            Err(CommandError::MissingArgument { .. })
        ));
        assert!(matches!(
            parse_special_command("/edit 123"),
            Err(CommandError::MissingArgument { .. })
        ));
        assert_eq!(
            parse_special_command("/edit abc new text"),
            Err(CommandError::UnsupportedArgument {
                command: "/edit".to_string(),
                arg: "abc".to_string()
            })
        );
    }

    #[test]
    fn test_parse_unknown_command() {
        let err = parse_special_command("/frobnicate").unwrap_err();
        assert_eq!(err, CommandError::UnknownCommand("/frobnicate".to_string()));
        assert!(err.to_string().contains("/help"));
    }
}
