//! quotesync CLI
//!
//! Command-line interface for quotesync - a local quote collection kept in
//! step with a remote server.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::Mutex;
use tracing::warn;

use quotesync_core::sync::SharedRepository;
use quotesync_core::{
    Config, FileStore, KeyValueStore, MemoryStore, QuoteRepository, SessionState,
};

mod commands;
mod logging;
mod output;
mod prompt;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "quotesync")]
#[command(about = "quotesync - Local quote collection with remote sync")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new quote
    Add {
        /// Quote text
        text: String,
        /// Category label
        #[arg(short, long)]
        category: String,
    },
    /// List quotes
    #[command(alias = "ls")]
    List {
        /// Filter by category (case-insensitive)
        #[arg(short, long)]
        category: Option<String>,
    },
    /// List categories
    Categories,
    /// Show a random quote
    Show {
        /// Category to pick from (defaults to the last one used)
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Import quotes from a JSON file
    Import {
        /// JSON file containing an array of {text, category}
        file: PathBuf,
    },
    /// Export quotes to a JSON file
    Export {
        /// Output file
        #[arg(short, long, default_value = "quotes.json")]
        output: PathBuf,
    },
    /// Sync once with the remote server
    Sync,
    /// Keep syncing periodically until Ctrl-C
    Watch,
    /// Show status (quote counts, sync settings)
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (server_url, sync_enabled, conflict_policy, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands don't need the store
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), cli.config.as_ref(), &output);
    }

    let config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;
    logging::init(&config);

    let store: Arc<dyn KeyValueStore> = Arc::new(
        FileStore::open(config.store_dir()).context("Failed to open quote store")?,
    );
    let session = SessionState::new(open_session_store(&config), store.clone());
    let repo: SharedRepository = Arc::new(Mutex::new(QuoteRepository::open(store)));

    match cli.command {
        Commands::Add { text, category } => {
            commands::quote::add(&mut *repo.lock().await, text, category, &output)?;
            commands::sync::push_quiet(&config, repo, &output).await;
            Ok(())
        }
        Commands::List { category } => {
            let repo = repo.lock().await;
            commands::quote::list(&repo, category, &output)
        }
        Commands::Categories => {
            let repo = repo.lock().await;
            commands::quote::categories(&repo, &output)
        }
        Commands::Show { category } => {
            let repo = repo.lock().await;
            commands::quote::show(&repo, &session, category, &output)
        }
        Commands::Import { file } => {
            commands::quote::import(&mut *repo.lock().await, &file, &output)?;
            commands::sync::push_quiet(&config, repo, &output).await;
            Ok(())
        }
        Commands::Export { output: path } => {
            let repo = repo.lock().await;
            commands::quote::export(&repo, &path, &output)
        }
        Commands::Sync => commands::sync::sync(&config, repo, &output).await,
        Commands::Watch => commands::sync::watch(&config, repo, &session, &output).await,
        Commands::Status => {
            let repo = repo.lock().await;
            commands::status::show(&config, &repo, &session, &output)
        }
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

/// Store scoped to the current terminal session
///
/// Falls back to memory, so nothing is restored on the next run.
fn open_session_store(config: &Config) -> Arc<dyn KeyValueStore> {
    let dir = config.session_dir();
    match FileStore::open(&dir) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!("Session store unavailable at {:?}: {}", dir, e);
            Arc::new(MemoryStore::new())
        }
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_add_with_category() {
        let cli =
            Cli::try_parse_from(["quotesync", "add", "Stay hungry.", "-c", "Life"]).unwrap();
        match cli.command {
            Commands::Add { text, category } => {
                assert_eq!(text, "Stay hungry.");
                assert_eq!(category, "Life");
            }
            _ => panic!("expected add"),
        }
    }

    #[test]
    fn test_add_requires_category() {
        assert!(Cli::try_parse_from(["quotesync", "add", "Stay hungry."]).is_err());
    }

    #[test]
    fn test_export_default_path() {
        let cli = Cli::try_parse_from(["quotesync", "--json", "export"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Export { output } => assert_eq!(output, PathBuf::from("quotes.json")),
            _ => panic!("expected export"),
        }
    }
}
