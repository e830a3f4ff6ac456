//! CursorBar - status-bar polling engine for Cursor usage and updates
//!
//! Polls the Cursor dashboard API for per-model usage, team ranking, and
//! analytics, and the update API for newer editor releases:
//! - `cursorbar` / `cursorbar usage` - one fetch cycle, printed
//! - `cursorbar watch` - the full engine with both recurring timers
//! - `cursorbar check-update` - one update check
//! - `cursorbar config` - manage the persisted settings

mod cli;
mod core;
mod dashboard;
mod engine;
mod logging;
mod net;
mod notify;
mod settings;
mod update;

use clap::Parser;
use cli::{exit_codes, Cli, Commands};

fn main() {
    let exit_code = run();
    std::process::exit(exit_code);
}

fn run() -> i32 {
    let cli = Cli::parse();

    // Initialize logging
    if let Err(e) = logging::init(cli.verbose, cli.json_output) {
        eprintln!("Failed to initialize logging: {}", e);
        return exit_codes::UNEXPECTED_FAILURE;
    }

    let client = match cli.build_client() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to build HTTP client: {}", e);
            return exit_codes::UNEXPECTED_FAILURE;
        }
    };

    // Create tokio runtime for async commands
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create runtime: {}", e);
            return exit_codes::UNEXPECTED_FAILURE;
        }
    };

    match cli.command {
        Some(Commands::Usage(args)) => rt.block_on(cli::usage::run(args, client)),
        Some(Commands::CheckUpdate(args)) => rt.block_on(cli::update::run(args, client)),
        Some(Commands::Watch(args)) => rt.block_on(cli::watch::run(args, client)),
        Some(Commands::Config(args)) => cli::config::run(args),
        None => {
            // Default: run usage command with args from top-level CLI
            let args = cli.to_usage_args();
            rt.block_on(cli::usage::run(args, client))
        }
    }
}
