//! CLI module - command-line interface
//!
//! - `cursorbar` - defaults to the usage command
//! - `cursorbar usage` - run one usage cycle and print the snapshot
//! - `cursorbar check-update` - run one update check and report
//! - `cursorbar watch` - run the full polling engine until interrupted
//! - `cursorbar config` - read and write settings keys

pub mod config;
pub mod update;
pub mod usage;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::net::{DirectClient, HelperClient, HttpClient};

/// Exit codes
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const UNEXPECTED_FAILURE: i32 = 1;
    pub const NOT_CONFIGURED: i32 = 2;
    pub const UNAUTHORIZED: i32 = 3;
    pub const FETCH_ERROR: i32 = 4;
}

/// CursorBar - Monitor Cursor usage quotas and editor updates
///
/// Polls the Cursor dashboard API for per-model usage and the update API
/// for newer editor releases. Defaults to the usage command when no
/// subcommand is given.
#[derive(Parser, Debug)]
#[command(name = "cursorbar")]
#[command(author, version, about, long_about = None)]
#[command(long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_COMMIT"), " ", env!("BUILD_DATE"), ")"))]
pub struct Cli {
    // === Global flags ===

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit machine-readable logs (JSON) to stderr
    #[arg(long = "json-output", global = true)]
    pub json_output: bool,

    /// Delegate HTTP requests to this helper binary instead of the
    /// in-process client (bypasses the dashboard's bot checkpoint)
    #[arg(long, global = true, env = "CURSORBAR_HELPER")]
    pub helper: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    // === Top-level args for the default usage command ===

    /// Output format: text or json
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Shorthand for --format json
    #[arg(long)]
    pub json: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one usage cycle and print the snapshot (default command)
    Usage(usage::UsageArgs),

    /// Run one update check against the Cursor update API
    CheckUpdate(update::CheckUpdateArgs),

    /// Run the polling engine until interrupted
    Watch(watch::WatchArgs),

    /// Read and write persisted settings
    Config(config::ConfigArgs),
}

impl Cli {
    /// Convert top-level args to UsageArgs for the default command
    pub fn to_usage_args(&self) -> usage::UsageArgs {
        usage::UsageArgs {
            format: if self.json {
                "json".to_string()
            } else {
                self.format.clone()
            },
            pretty: self.pretty,
        }
    }

    /// Build the request client the flags ask for.
    pub fn build_client(&self) -> anyhow::Result<Arc<dyn HttpClient>> {
        match &self.helper {
            Some(path) => Ok(Arc::new(HelperClient::new(path.clone()))),
            None => Ok(Arc::new(DirectClient::new()?)),
        }
    }
}
