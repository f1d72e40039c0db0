//! CLI command tests

use clap::Parser;

use crate::cli::{Cli, Commands, PromptsAction};
use crate::commands;

#[test]
fn test_cmd_prompts_list() {
    assert!(commands::cmd_prompts_list().is_ok());
}

#[test]
fn test_cmd_prompts_show_known_id() {
    assert!(commands::cmd_prompts_show("classify_intent").is_ok());
}

#[test]
fn test_cmd_prompts_show_unknown_id() {
    let err = commands::cmd_prompts_show("nope").unwrap_err();
    assert!(err.to_string().contains("Unknown prompt"));
}

#[test]
fn test_cmd_init_creates_db() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test.db");

    assert!(commands::cmd_init(&db_path).is_ok());
    assert!(db_path.exists());
}

#[test]
fn test_cli_parses_chat_with_handle() {
    let cli = Cli::parse_from(["finbuddy", "chat", "--handle", "+919876543210"]);
    match cli.command {
        Commands::Chat { handle } => assert_eq!(handle, "+919876543210"),
        _ => panic!("expected chat command"),
    }
}

#[test]
fn test_cli_defaults() {
    let cli = Cli::parse_from(["finbuddy", "status"]);
    assert_eq!(cli.db.to_string_lossy(), "finbuddy.db");
    assert!(!cli.verbose);
}

#[test]
fn test_cli_parses_serve_port() {
    let cli = Cli::parse_from(["finbuddy", "serve", "--port", "8080"]);
    match cli.command {
        Commands::Serve { port, host } => {
            assert_eq!(port, 8080);
            assert_eq!(host, "127.0.0.1");
        }
        _ => panic!("expected serve command"),
    }
}

#[test]
fn test_cli_parses_prompts_show() {
    let cli = Cli::parse_from(["finbuddy", "prompts", "show", "follow_up"]);
    match cli.command {
        Commands::Prompts {
            action: Some(PromptsAction::Show { prompt_id }),
        } => assert_eq!(prompt_id, "follow_up"),
        _ => panic!("expected prompts show command"),
    }
}
