// ABOUTME: NutriAI CLI - command-line front end for the chat synchronization client
// ABOUTME: Lists, shows, sends into, and watches conversations against a live backend
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriAI Contributors
//!
//! Usage:
//! ```bash
//! # List conversations for a user
//! nutriai-cli --user user-42 list
//!
//! # Show one thread
//! nutriai-cli show 6650c1f2
//!
//! # Start a new conversation with its first message
//! nutriai-cli --user user-42 send "Is oatmeal a good pre-run breakfast?"
//!
//! # Continue an existing conversation
//! nutriai-cli send --conversation 6650c1f2 "What about bananas?"
//!
//! # Follow the polled conversation list until Ctrl-C
//! nutriai-cli --user user-42 watch
//! ```

mod commands;
mod display;

use clap::{Parser, Subcommand};
use nutriai_core::constants::env_vars;
use nutriai_core::errors::AppResult;
use nutriai_sync::client::SyncClient;
use nutriai_sync::config::SyncConfig;
use nutriai_sync::logging::LoggingConfig;
use tracing::{debug, error};
use url::Url;

#[derive(Parser)]
#[command(
    name = "nutriai-cli",
    about = "NutriAI chat client",
    long_about = "Command-line client for NutriAI conversations, built on the cached, optimistic sync core."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Backend base URL override
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Signed-in user id override
    #[arg(long, global = true)]
    user: Option<String>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[non_exhaustive]
#[derive(Subcommand)]
enum Command {
    /// List conversations, most recent first as the server orders them
    List,

    /// Show the messages of one conversation
    Show {
        /// Conversation id
        conversation_id: String,
    },

    /// Send a message, creating a conversation when none is given
    Send {
        /// Existing conversation id
        #[arg(long, short = 'c')]
        conversation: Option<String>,

        /// Message text
        text: String,
    },

    /// Print the conversation list every time a poll changes it
    Watch,
}

fn load_config(cli: &Cli) -> AppResult<SyncConfig> {
    let mut config = SyncConfig::from_env()?;
    if let Some(raw) = &cli.base_url {
        config.api.base_url = Url::parse(raw).map_err(|e| {
            nutriai_core::errors::AppError::config(format!("Invalid --base-url '{raw}': {e}"))
        })?;
    }
    if let Some(user) = &cli.user {
        config.user_id = Some(user.clone());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env();
    if cli.verbose {
        logging.level = "debug".to_owned();
    }
    logging.init()?;

    let config = load_config(&cli)?;
    debug!(
        base_url = %config.api.base_url,
        user = ?config.user_id,
        "Configuration loaded (override with {})",
        env_vars::API_BASE_URL
    );
    let client = SyncClient::connect(config)?;

    let result = match cli.command {
        Command::List => commands::list(&client).await,
        Command::Show { conversation_id } => commands::show(&client, conversation_id.into()).await,
        Command::Send { conversation, text } => {
            commands::send(&client, conversation.map(Into::into), text).await
        }
        Command::Watch => commands::watch(&client).await,
    };

    client.shutdown();
    if let Err(e) = &result {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e.user_message());
    }
    result.map_err(Into::into)
}
