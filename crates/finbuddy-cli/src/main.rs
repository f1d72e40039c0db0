//! FinBuddy CLI - conversational personal finance assistant
//!
//! Usage:
//!   finbuddy init                 Initialize database
//!   finbuddy chat                 Talk to the assistant from the terminal
//!   finbuddy report               Print the weekly spending digest
//!   finbuddy serve --port 3000    Start the WhatsApp webhook server

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db),
        Commands::Chat { handle } => commands::cmd_chat(&cli.db, &handle).await,
        Commands::Report {
            handle,
            week_ending,
        } => commands::cmd_report(&cli.db, &handle, week_ending.as_deref()).await,
        Commands::Serve { port, host } => commands::cmd_serve(&cli.db, &host, port).await,
        Commands::Status => commands::cmd_status(&cli.db).await,
        Commands::Prompts { action } => match action {
            None | Some(PromptsAction::List) => commands::cmd_prompts_list(),
            Some(PromptsAction::Show { prompt_id }) => commands::cmd_prompts_show(&prompt_id),
            Some(PromptsAction::Path) => commands::cmd_prompts_path(),
        },
    }
}
