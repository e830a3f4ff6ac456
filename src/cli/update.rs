//! Check-update command implementation

use std::sync::Arc;

use clap::Args;

use crate::cli::exit_codes;
use crate::net::HttpClient;
use crate::notify::{LogSink, NotificationCenter};
use crate::settings::SettingsStore;
use crate::update::{HostProbe, UpdateChecker, UpdateCheckOutcome};

/// Arguments for the check-update command
#[derive(Args, Debug, Default)]
pub struct CheckUpdateArgs {
    /// Check even when update checking is disabled in settings
    #[arg(long)]
    pub force: bool,
}

pub async fn run(args: CheckUpdateArgs, client: Arc<dyn HttpClient>) -> i32 {
    let settings = Arc::new(SettingsStore::open());
    if args.force {
        settings.set_check_update(true);
    }

    let notifications = Arc::new(NotificationCenter::new(Arc::new(LogSink::new())));
    let checker = UpdateChecker::new(client, settings, notifications, Arc::new(HostProbe));

    match checker.run_cycle().await {
        UpdateCheckOutcome::Disabled => {
            println!("Update checking is disabled (enable it or pass --force).");
            exit_codes::SUCCESS
        }
        UpdateCheckOutcome::UpToDate { local } => {
            println!("Cursor {local} is up to date.");
            exit_codes::SUCCESS
        }
        UpdateCheckOutcome::UpdateAvailable { local, remote } => {
            println!("Update available: {remote} (installed: {local})");
            println!("Changelog: https://www.cursor.com/changelog");
            exit_codes::SUCCESS
        }
        UpdateCheckOutcome::Inconclusive => {
            eprintln!("Could not complete the update check; run with --verbose for details.");
            exit_codes::FETCH_ERROR
        }
    }
}
