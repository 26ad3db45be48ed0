use super::open_store;
use super::render::render_message;
use crate::cli::HistoryCommand;
use crate::config::Config;
use crate::conversation::ConversationSummary;
use crate::error::{ChatlineError, Result};
use crate::storage::ConversationStore;
use colored::Colorize;
use prettytable::{format, Table};

/// Handle history commands
pub fn handle_history(config: &Config, command: HistoryCommand) -> Result<()> {
    let store = open_store(config)?;
    run_history(&store, command)
}

fn run_history(store: &ConversationStore, command: HistoryCommand) -> Result<()> {
    match command {
        HistoryCommand::List => {
            let index = store.load_all()?;
            print_summaries(&index.summaries());
            if !index.is_empty() {
                println!(
                    "Use {} to resume a conversation.",
                    "chatline chat --resume <ID>".cyan()
                );
                println!();
            }
        }
        HistoryCommand::Show { id } => {
            let index = store.load_all()?;
            let conversation = index
                .get(&id)
                .ok_or_else(|| ChatlineError::ConversationNotFound(id.clone()))?;

            println!("\n{}\n", conversation.id.bold());
            if conversation.messages.is_empty() {
                println!("{}", "(no messages)".dimmed());
            }
            for message in &conversation.messages {
                println!("{}\n", render_message(message));
            }
        }
        HistoryCommand::Delete { id } => {
            let mut index = store.load_all()?;
            if index.remove(&id).is_none() {
                return Err(ChatlineError::ConversationNotFound(id).into());
            }
            store.save_all(&index)?;
            println!("{}", format!("Deleted conversation {}", id).green());
        }
    }

    Ok(())
}

/// Print conversation summaries as a table
pub fn print_summaries(summaries: &[ConversationSummary]) {
    if summaries.is_empty() {
        println!("{}", "No conversations yet.".yellow());
        return;
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row![
        "ID".bold(),
        "Title".bold(),
        "Messages".bold()
    ]);

    for summary in summaries {
        table.add_row(prettytable::row![
            summary.id.cyan(),
            summary.title,
            summary.message_count
        ]);
    }

    println!("\nConversations:");
    table.printstd();
    println!();
}
