//! Usage snapshot data model
//!
//! The atomically-published result of one dashboard fetch cycle, plus the
//! quota math the status-bar display is built from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-model usage counters from the usage endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelUsage {
    pub num_requests: i64,
    pub num_tokens: i64,
}

/// Parsed usage payload: one entry per model plus the billing cycle start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Model name -> usage counters, sorted for stable display order.
    pub models: BTreeMap<String, ModelUsage>,
    /// Start of the current billing month, as reported by the API.
    pub start_of_month: Option<String>,
}

impl UsageSnapshot {
    /// Parse the raw usage payload.
    ///
    /// The payload mixes model entries with scalar fields like
    /// `startOfMonth`, so an entry only counts as a model when both
    /// `numRequests` and `numTokens` are present.
    pub fn from_payload(payload: &serde_json::Value) -> Self {
        let mut models = BTreeMap::new();
        if let Some(map) = payload.as_object() {
            for (key, value) in map {
                let num_requests = value.get("numRequests").and_then(|v| v.as_i64());
                let num_tokens = value.get("numTokens").and_then(|v| v.as_i64());
                if let (Some(num_requests), Some(num_tokens)) = (num_requests, num_tokens) {
                    models.insert(
                        key.clone(),
                        ModelUsage {
                            num_requests,
                            num_tokens,
                        },
                    );
                }
            }
        }
        let start_of_month = payload
            .get("startOfMonth")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        Self {
            models,
            start_of_month,
        }
    }

    /// Premium request count for the metered model.
    pub fn premium_requests(&self) -> i64 {
        self.models
            .get("gpt-4")
            .map(|m| m.num_requests)
            .unwrap_or(0)
    }
}

/// First team of the account, when it has one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamInfo {
    pub id: i64,
    pub name: String,
}

/// Trailing seven-day team ranking and aggregate counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAnalytics {
    pub apply_lines_rank: i64,
    pub total_team_members: i64,
    pub total_apply_lines: i64,
    pub team_average_apply_lines: f64,
    pub tabs_accepted_rank: i64,
    pub total_tabs_accepted: i64,
    pub team_average_tabs_accepted: f64,
}

/// Everything one fetch cycle publishes to the renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub usage: UsageSnapshot,
    pub team_info: Option<TeamInfo>,
    pub user_analytics: Option<UserAnalytics>,
    pub monthly_quota: i64,
}

impl DashboardSnapshot {
    /// Percentage of the monthly quota consumed, floored.
    pub fn used_percent(&self) -> i64 {
        if self.monthly_quota <= 0 {
            return 0;
        }
        self.usage.premium_requests() * 100 / self.monthly_quota
    }

    /// Percentage of the monthly quota still available, floored.
    pub fn remaining_percent(&self) -> i64 {
        if self.monthly_quota <= 0 {
            return 0;
        }
        (self.monthly_quota - self.usage.premium_requests()) * 100 / self.monthly_quota
    }

    /// Icon name for the current remaining-quota tier.
    pub fn quota_icon(&self) -> &'static str {
        quota_icon(self.remaining_percent())
    }
}

/// Map remaining-quota percentage to a battery-style tier icon.
pub fn quota_icon(remaining_percent: i64) -> &'static str {
    match remaining_percent {
        90.. => "battery-level-100-symbolic",
        80..=89 => "battery-level-90-symbolic",
        70..=79 => "battery-level-80-symbolic",
        60..=69 => "battery-level-70-symbolic",
        50..=59 => "battery-level-60-symbolic",
        40..=49 => "battery-level-50-symbolic",
        30..=39 => "battery-level-40-symbolic",
        20..=29 => "battery-level-30-symbolic",
        10..=19 => "battery-low-symbolic",
        _ => "battery-action-symbolic",
    }
}

/// What the status-bar indicator should show.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayState {
    /// No fetch has completed yet.
    Loading,
    /// A cycle published a full snapshot.
    Ready(DashboardSnapshot),
    /// The usage endpoint rejected the session cookie.
    Unauthorized,
    /// The cycle failed; previous data may be stale.
    Error,
}

impl DisplayState {
    /// Short label for the indicator text.
    pub fn label(&self) -> String {
        match self {
            DisplayState::Loading => "Loading...".to_string(),
            DisplayState::Ready(snapshot) => {
                format!("GPT-4: {}", snapshot.usage.premium_requests())
            }
            DisplayState::Unauthorized => "Unauthorized".to_string(),
            DisplayState::Error => "Error".to_string(),
        }
    }
}
