//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod say;
pub mod threads;


use std::error::Error;

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::cli::say::run_say;
use crate::cli::threads::{delete_thread, list_threads, show_history};
use crate::core::config::{Config, ConfigKey, Settings, BASE_URL_ENV};
use crate::ui::chat_loop::run_chat;
use crate::utils::logging::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "synapse")]
#[command(about = "A terminal chat client for Synapse conversation threads")]
#[command(
    long_about = "Synapse is a line-based terminal chat client. Replies stream in token by token, \
and every conversation is a server-side thread you can list, reopen, and delete.\n\n\
Environment Variables:\n\
  SYNAPSE_API_URL   Backend base URL (overrides the config file)\n\
  RUST_LOG          Diagnostic log filter (diagnostics go to stderr)\n\n\
Chat commands:\n\
  /help             List all commands\n\
  /new              Start a new conversation\n\
  /threads          List conversations\n\
  /switch <n|id>    Open a conversation\n\
  /log <filename>   Enable transcript logging to a file\n\
  /quit             Exit"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Backend base URL (e.g., http://localhost:8000)
    #[arg(short = 'u', long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Enable transcript logging to the specified file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<String>,

    /// Print debug diagnostics to stderr
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the interactive chat (default)
    Chat,
    /// Send one message on a new thread and print the streamed reply
    Say {
        /// Message text (multiple words are joined with spaces)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// List conversation threads with their titles
    Threads,
    /// Print the messages of a thread
    History {
        /// Thread id
        id: String,
    },
    /// Delete a thread
    Delete {
        /// Thread id
        id: String,
    },
    /// Set a configuration value, or show the configuration when no value is given
    Set {
        /// Configuration key (base-url, connect-timeout, title-min-chars, log-file)
        key: Option<String>,
        /// Value to set for the key
        #[arg(trailing_var_arg = true)]
        value: Vec<String>,
    },
    /// Unset a configuration value
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

/// Effective settings for this invocation.
pub fn resolve_settings(args: &Args, config: &Config) -> Settings {
    let env_base_url = std::env::var(BASE_URL_ENV).ok();
    config.resolve(
        args.base_url.as_deref(),
        env_base_url.as_deref(),
        args.log.as_deref(),
    )
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = Config::load()?;
    let settings = resolve_settings(&args, &config);
    debug!(base_url = %settings.base_url, "Resolved settings");

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(settings).await,
        Commands::Say { prompt } => run_say(&settings, prompt).await,
        Commands::Threads => list_threads(&settings).await,
        Commands::History { id } => show_history(&settings, &id).await,
        Commands::Delete { id } => delete_thread(&settings, &id).await,
        Commands::Set { key, value } => set_config_value(config, key, value),
        Commands::Unset { key } => unset_config_value(config, &key),
    }
}

fn set_config_value(
    mut config: Config,
    key: Option<String>,
    value: Vec<String>,
) -> Result<(), Box<dyn Error>> {
    let Some(key) = key else {
        config.print_all();
        return Ok(());
    };
    let key: ConfigKey = key.parse()?;
    if value.is_empty() {
        config.print_all();
        return Ok(());
    }

    let value = value.join(" ");
    config.set_value(key, &value)?;
    config.save()?;
    println!("✅ Set {key} to: {value}");
    Ok(())
}

fn unset_config_value(mut config: Config, key: &str) -> Result<(), Box<dyn Error>> {
    let key: ConfigKey = key.parse()?;
    config.unset_value(key);
    config.save()?;
    println!("✅ Unset {key}");
    Ok(())
}
