//! Usage command implementation

use std::sync::Arc;

use clap::Args;

use crate::cli::exit_codes;
use crate::core::{DashboardSnapshot, DisplayState};
use crate::dashboard::{CycleOutcome, DashboardFetcher};
use crate::net::HttpClient;
use crate::settings::SettingsStore;

/// Arguments for the usage command
#[derive(Args, Debug, Default)]
pub struct UsageArgs {
    /// Output format: text or json
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

pub async fn run(args: UsageArgs, client: Arc<dyn HttpClient>) -> i32 {
    let settings = Arc::new(SettingsStore::open());
    let fetcher = DashboardFetcher::new(client, settings);

    match fetcher.run_cycle().await {
        CycleOutcome::Skip => {
            eprintln!("No session cookie configured. Set one with: cursorbar config set cookie <value>");
            exit_codes::NOT_CONFIGURED
        }
        CycleOutcome::Publish(DisplayState::Unauthorized) => {
            eprintln!("Session cookie rejected by the dashboard. Refresh it from your browser.");
            exit_codes::UNAUTHORIZED
        }
        CycleOutcome::Publish(DisplayState::Ready(snapshot)) => {
            if args.format == "json" {
                print_json(&snapshot, args.pretty);
            } else {
                print_text(&snapshot);
            }
            exit_codes::SUCCESS
        }
        CycleOutcome::Publish(_) => {
            eprintln!("Could not fetch usage data; run with --verbose for details.");
            exit_codes::FETCH_ERROR
        }
    }
}

fn print_json(snapshot: &DashboardSnapshot, pretty: bool) {
    let rendered = if pretty {
        serde_json::to_string_pretty(snapshot)
    } else {
        serde_json::to_string(snapshot)
    };
    match rendered {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Failed to encode snapshot: {e}"),
    }
}

fn print_text(snapshot: &DashboardSnapshot) {
    println!("Cursor Usage");
    println!(
        "  Premium requests: {} / {} ({}% used)",
        snapshot.usage.premium_requests(),
        snapshot.monthly_quota,
        snapshot.used_percent()
    );
    if let Some(start) = &snapshot.usage.start_of_month {
        println!("  Cycle started:    {start}");
    }
    for (model, usage) in &snapshot.usage.models {
        println!("  {model}");
        println!("    Requests: {}", usage.num_requests);
        println!("    Tokens:   {}", usage.num_tokens);
    }
    if let Some(team) = &snapshot.team_info {
        println!("  Team: {} (#{})", team.name, team.id);
    }
    if let Some(analytics) = &snapshot.user_analytics {
        println!(
            "  Lines accepted rank: {} of {} ({} lines, team avg {:.0})",
            analytics.apply_lines_rank,
            analytics.total_team_members,
            analytics.total_apply_lines,
            analytics.team_average_apply_lines
        );
        println!(
            "  Tabs accepted rank:  {} of {} ({} tabs, team avg {:.0})",
            analytics.tabs_accepted_rank,
            analytics.total_team_members,
            analytics.total_tabs_accepted,
            analytics.team_average_tabs_accepted
        );
    }
}
