//! Command implementations

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};

use finbuddy_core::{Database, Dispatcher, ModelBackend, ModelClient, PromptId, PromptLibrary};
use finbuddy_server::ServerConfig;

/// Open (or create) the database at the given path
pub fn open_db(path: &Path) -> Result<Database> {
    let path_str = path.to_string_lossy();
    Database::new(&path_str).with_context(|| format!("Failed to open database at {}", path_str))
}

/// Build the model client from the environment, or explain how to
fn model_from_env() -> Result<ModelClient> {
    ModelClient::from_env().ok_or_else(|| {
        anyhow::anyhow!(
            "No model backend configured. Set GEMINI_API_KEY, or MODEL_BACKEND=ollama with OLLAMA_HOST."
        )
    })
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    let db = open_db(db_path)?;
    println!("Database initialized at {}", db.path());
    Ok(())
}

/// Interactive chat loop against the full dispatch pipeline
pub async fn cmd_chat(db_path: &Path, handle: &str) -> Result<()> {
    let db = open_db(db_path)?;
    let model = model_from_env()?;
    println!(
        "Chatting as '{}' via {} ({}). Type 'exit' to quit, 'clear' to reset context.",
        handle,
        model.model(),
        model.host()
    );

    let dispatcher = Dispatcher::new(db, model);
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("you> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            "exit" | "quit" => break,
            "clear" => {
                let removed = dispatcher.clear_context(handle)?;
                println!("Cleared {} context entries.", removed);
            }
            "history" => {
                let summary = dispatcher.context_summary(handle)?;
                println!(
                    "{} entries ({} yours, {} mine){}",
                    summary.total,
                    summary.user_turns,
                    summary.assistant_turns,
                    summary
                        .last
                        .map(|l| format!(", last: {}", l))
                        .unwrap_or_default()
                );
            }
            message => {
                let reply = dispatcher.handle_message(handle, message).await;
                println!("finbuddy> {}", reply);
            }
        }
    }

    println!("Bye!");
    Ok(())
}

pub async fn cmd_report(db_path: &Path, handle: &str, week_ending: Option<&str>) -> Result<()> {
    let db = open_db(db_path)?;
    let model = model_from_env()?;
    let dispatcher = Dispatcher::new(db, model);

    let week_ending = match week_ending {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .context("Invalid --week-ending date format (use YYYY-MM-DD)")?,
        None => Local::now().date_naive(),
    };

    let report = dispatcher.weekly_report(handle, week_ending).await?;
    println!("{}", report);
    Ok(())
}

pub async fn cmd_serve(db_path: &Path, host: &str, port: u16) -> Result<()> {
    let db = open_db(db_path)?;
    let config = ServerConfig::from_env()?;
    finbuddy_server::serve(db, host, port, config).await
}

pub async fn cmd_status(db_path: &Path) -> Result<()> {
    let db = open_db(db_path)?;

    println!("Database: {}", db.path());
    println!("  Users:        {}", db.count_users()?);
    println!("  Transactions: {}", db.count_transactions()?);

    match ModelClient::from_env() {
        Some(model) => {
            let reachable = if model.health_check().await {
                "reachable"
            } else {
                "not responding"
            };
            println!("Model: {} at {} ({})", model.model(), model.host(), reachable);
        }
        None => println!("Model: not configured"),
    }

    Ok(())
}

pub fn cmd_prompts_list() -> Result<()> {
    let mut library = PromptLibrary::new();

    println!(
        "{:<20} {:<8} {:<14} {}",
        "ID", "VERSION", "TASK", "OVERRIDE"
    );
    for info in library.list() {
        let override_marker = if info.has_override {
            info.override_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "yes".to_string())
        } else {
            "-".to_string()
        };
        println!(
            "{:<20} {:<8} {:<14} {}",
            info.id, info.version, info.task_type, override_marker
        );
    }
    Ok(())
}

pub fn cmd_prompts_show(prompt_id: &str) -> Result<()> {
    let id = PromptId::all()
        .iter()
        .find(|id| id.as_str() == prompt_id)
        .copied();
    let Some(id) = id else {
        bail!(
            "Unknown prompt '{}'. Known prompts: {}",
            prompt_id,
            PromptId::all()
                .iter()
                .map(|id| id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    };

    let mut library = PromptLibrary::new();
    let prompt = library.get(id)?;
    if prompt.is_override {
        println!(
            "(override: {})",
            prompt
                .override_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        );
    }
    println!("{}", prompt.content);
    Ok(())
}

pub fn cmd_prompts_path() -> Result<()> {
    match finbuddy_core::prompts::default_prompts_dir() {
        Some(dir) => println!("{}", dir.display()),
        None => bail!("Could not determine the platform data directory"),
    }
    Ok(())
}
