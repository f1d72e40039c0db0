//! CLI argument definitions using clap
//!
//! This module contains the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// FinBuddy - conversational personal finance assistant
#[derive(Parser)]
#[command(name = "finbuddy")]
#[command(about = "WhatsApp finance assistant: log spending and ask about it in plain language", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "finbuddy.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Chat with the assistant from the terminal
    ///
    /// Meta commands inside the session: 'clear' drops your conversation
    /// context, 'history' shows context counts, 'exit' quits.
    Chat {
        /// Handle to chat as (stands in for a WhatsApp number)
        #[arg(long, default_value = "local")]
        handle: String,
    },

    /// Print the weekly spending digest for a user
    Report {
        /// Handle to report on
        #[arg(long, default_value = "local")]
        handle: String,

        /// Last day of the week to cover (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        week_ending: Option<String>,
    },

    /// Start the WhatsApp webhook server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Show database and backend status
    Status,

    /// Inspect prompts and their override status
    Prompts {
        #[command(subcommand)]
        action: Option<PromptsAction>,
    },
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all prompts with override status
    List,

    /// Show a prompt's content
    Show {
        /// Prompt ID (e.g., classify_intent)
        prompt_id: String,
    },

    /// Print the prompt override directory path
    Path,
}
