//! Watch command: run the polling engine until interrupted

use std::sync::Arc;

use clap::Args;

use crate::cli::exit_codes;
use crate::core::DisplayState;
use crate::engine::{Engine, Renderer};
use crate::net::HttpClient;
use crate::notify::LogSink;
use crate::settings::SettingsStore;
use crate::update::HostProbe;

/// Arguments for the watch command
#[derive(Args, Debug, Default)]
pub struct WatchArgs {
    /// Override the usage refresh interval for this run (seconds)
    #[arg(long)]
    pub interval: Option<u64>,
}

/// Renders each published state as one status line.
struct TerminalRenderer;

impl Renderer for TerminalRenderer {
    fn render(&self, state: &DisplayState) {
        match state {
            DisplayState::Ready(snapshot) => {
                println!(
                    "[{}] {}  ({}% of {} used, icon {})",
                    chrono::Local::now().format("%H:%M:%S"),
                    state.label(),
                    snapshot.used_percent(),
                    snapshot.monthly_quota,
                    snapshot.quota_icon()
                );
            }
            other => {
                println!(
                    "[{}] {}",
                    chrono::Local::now().format("%H:%M:%S"),
                    other.label()
                );
            }
        }
    }
}

pub async fn run(args: WatchArgs, client: Arc<dyn HttpClient>) -> i32 {
    let settings = Arc::new(SettingsStore::open());
    if let Some(interval) = args.interval {
        settings.set_update_interval_secs(interval);
    }

    let engine = Engine::new(
        settings,
        client,
        Arc::new(TerminalRenderer),
        Arc::new(LogSink::new()),
        Arc::new(HostProbe),
    );
    engine.start();
    tracing::info!("engine started; press ctrl-c to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to wait for ctrl-c: {e}");
        engine.dispose();
        return exit_codes::UNEXPECTED_FAILURE;
    }

    tracing::info!("shutting down");
    engine.dispose();
    exit_codes::SUCCESS
}
