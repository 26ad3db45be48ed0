//! Chatline - terminal chat client
//!
#![doc = "Chatline - terminal chat client"]
#![doc = "Main entry point for the Chatline application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chatline::cli::{Cli, Commands};
use chatline::commands;
use chatline::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Chat { resume } => {
            tracing::info!("Starting interactive chat mode");
            if let Some(r) = &resume {
                tracing::debug!("Resuming conversation: {}", r);
            }
            commands::chat::run_chat(config, resume).await?;
            Ok(())
        }
        Commands::Serve { .. } => {
            tracing::info!("Starting server on {}", config.server.addr);
            commands::serve::run_serve(config).await?;
            Ok(())
        }
        Commands::Scrape { url } => {
            tracing::debug!("Scraping {}", url);
            commands::scrape::run_scrape(config, url).await?;
            Ok(())
        }
        Commands::History { command } => {
            tracing::info!("Starting history command");
            commands::history::handle_history(&config, command)?;
            Ok(())
        }
        Commands::Auth => {
            tracing::info!("Storing completion API key");
            commands::auth::authenticate()?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// Logs go to stderr so they do not interleave with chat output.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "chatline=debug"
    } else {
        "chatline=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
