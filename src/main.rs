//! CLI entry point for deskpilot.

mod cli;

use clap::Parser;
use deskpilot::config::{initialize_default_global_config, load_config, GlobalConfigInitResult};
use deskpilot::protocol::parse_event_line;
use deskpilot::server::run_server;
use deskpilot::view::ClientViewState;

#[tokio::main]
async fn main() {
    let args = cli::Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match args.command.unwrap_or(cli::Command::Serve { listen: None }) {
        cli::Command::Serve { listen } => {
            let mut config = match load_config(args.config.as_deref()) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            };
            if let Some(listen) = listen {
                config.server.listen_addr = listen;
            }
            if let Some(model) = args.model {
                config.generation.model = model;
            }
            if let Err(e) = run_server(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        cli::Command::Init { force } => match initialize_default_global_config(force) {
            Ok(GlobalConfigInitResult::Created { path }) => {
                println!("created {}", path.display());
            }
            Ok(GlobalConfigInitResult::AlreadyInitialized { path }) => {
                println!(
                    "already initialized: {} (pass --force to overwrite)",
                    path.display()
                );
            }
            Ok(GlobalConfigInitResult::Overwritten { path, backup_path }) => {
                println!(
                    "overwrote {} (previous config saved to {})",
                    path.display(),
                    backup_path.display()
                );
            }
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        },
        cli::Command::Replay { file } => {
            if let Err(e) = run_replay(file.as_deref()) {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
    }
}

/// Fold a captured stream back into the conversation view and print it.
fn run_replay(path: Option<&str>) -> Result<(), String> {
    let text = match path {
        Some(path) => {
            std::fs::read_to_string(path).map_err(|e| format!("failed to read {path}: {e}"))?
        }
        None => std::io::read_to_string(std::io::stdin())
            .map_err(|e| format!("failed to read stdin: {e}"))?,
    };

    let mut view = ClientViewState::new();
    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let event = parse_event_line(line).map_err(|e| format!("line {}: {e}", number + 1))?;
        view.apply(&event);
    }

    println!("{}", view.summary());
    Ok(())
}
