// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parley - a conversational agent that answers in text, pictures, voice
//! notes, or a phone call.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod chat;
mod config_cmd;
mod serve;
mod wiring;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Parley - a conversational agent with memory and phone calls.
#[derive(Parser, Debug)]
#[command(name = "parley", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP gateway and the call sweeper.
    Serve,
    /// Chat with the persona in the terminal.
    Chat {
        /// Continue an existing session.
        #[arg(long)]
        session: Option<String>,
        /// Owner id the session and memories belong to.
        #[arg(long, default_value = "local")]
        owner: String,
    },
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration with secrets redacted.
    Show,
    /// Validate the configuration and exit.
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => parley_config::load_and_validate_path(path),
        None => parley_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            parley_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Chat { session, owner }) => chat::run_chat(config, session, owner).await,
        Some(Commands::Config { action }) => match action {
            ConfigAction::Show => config_cmd::show(&config),
            ConfigAction::Check => {
                println!("parley: configuration is valid (agent.name={})", config.agent.name);
                Ok(())
            }
        },
        None => {
            println!("parley: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("parley: {e}");
        std::process::exit(1);
    }
}
