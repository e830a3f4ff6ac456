//! Config command: read and write persisted settings

use clap::{Args, Subcommand};

use crate::cli::exit_codes;
use crate::settings::{Settings, SettingsStore};

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print all settings (cookie redacted)
    Show,
    /// Print one settings value
    Get { key: String },
    /// Set one settings value
    Set { key: String, value: String },
}

pub fn run(args: ConfigArgs) -> i32 {
    let store = SettingsStore::open();
    match args.action {
        ConfigAction::Show => {
            let settings = store.get();
            println!("cookie               {}", redact(&settings.cookie));
            println!("user-id              {}", display(&settings.user_id));
            println!("monthly-quota        {}", settings.monthly_quota);
            println!("update-interval      {}", settings.update_interval_secs);
            println!("check-update         {}", settings.check_update);
            println!("debug-mode           {}", settings.debug_mode);
            println!("trigger-check-update {}", settings.trigger_check_update);
            match &settings.user {
                Some(user) => println!(
                    "user                 {}",
                    user.email.as_deref().unwrap_or("<no email>")
                ),
                None => println!("user                 <unset>"),
            }
            exit_codes::SUCCESS
        }
        ConfigAction::Get { key } => match get_value(&store.get(), &key) {
            Some(value) => {
                println!("{value}");
                exit_codes::SUCCESS
            }
            None => {
                eprintln!("Unknown settings key: {key}");
                exit_codes::UNEXPECTED_FAILURE
            }
        },
        ConfigAction::Set { key, value } => match set_value(&store, &key, &value) {
            Ok(()) => exit_codes::SUCCESS,
            Err(e) => {
                eprintln!("{e}");
                exit_codes::UNEXPECTED_FAILURE
            }
        },
    }
}

fn display(value: &str) -> &str {
    if value.is_empty() {
        "<unset>"
    } else {
        value
    }
}

fn redact(cookie: &str) -> String {
    if cookie.is_empty() {
        "<unset>".to_string()
    } else if cookie.len() > 12 {
        format!("{}...", &cookie[..12])
    } else {
        "****".to_string()
    }
}

fn get_value(settings: &Settings, key: &str) -> Option<String> {
    match key {
        "cookie" => Some(settings.cookie.clone()),
        "user-id" => Some(settings.user_id.clone()),
        "monthly-quota" => Some(settings.monthly_quota.to_string()),
        "update-interval" => Some(settings.update_interval_secs.to_string()),
        "check-update" => Some(settings.check_update.to_string()),
        "debug-mode" => Some(settings.debug_mode.to_string()),
        "trigger-check-update" => Some(settings.trigger_check_update.to_string()),
        _ => None,
    }
}

fn set_value(store: &SettingsStore, key: &str, value: &str) -> anyhow::Result<()> {
    match key {
        "cookie" => store.set_cookie(value),
        "user-id" => store.set_user_id(value),
        "monthly-quota" => store.set_monthly_quota(value.parse()?),
        "update-interval" => store.set_update_interval_secs(value.parse()?),
        "check-update" => store.set_check_update(value.parse()?),
        "debug-mode" => store.set_debug_mode(value.parse()?),
        "trigger-check-update" => store.set_trigger_check_update(value.parse()?),
        _ => anyhow::bail!("Unknown settings key: {key}"),
    }
    Ok(())
}
