//! Dashboard usage/analytics fetcher
//!
//! One cycle runs the whole chain: credential check, user-id derivation,
//! usage fetch, then best-effort team and analytics lookups. The result is
//! a complete snapshot published in one piece; a failed cycle never leaves
//! a partially-merged one behind.

use std::sync::Arc;

use chrono::{Duration, Local, NaiveTime, TimeZone};
use serde_json::json;
use thiserror::Error;

use crate::core::{
    user_id_from_cookie, AccountProfile, DashboardSnapshot, DisplayState, TeamInfo, UsageSnapshot,
    UserAnalytics,
};
use crate::net::{HttpClient, RequestError, RequestSpec};
use crate::settings::SettingsStore;

const USAGE_URL: &str = "https://www.cursor.com/api/usage";
const TEAMS_URL: &str = "https://cursor.com/api/dashboard/teams";
const ANALYTICS_URL: &str = "https://cursor.com/api/dashboard/get-user-analytics";
const AUTH_ME_URL: &str = "https://www.cursor.com/api/auth/me";

/// Why a usage cycle stopped early.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Credential or identifier missing. Not an error state, just "not
    /// configured yet".
    #[error("no credential configured")]
    NotConfigured,

    #[error("session cookie rejected")]
    Unauthorized,

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("unexpected HTTP status {0}")]
    Status(u16),
}

/// Outcome of one usage cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// A new display state to publish.
    Publish(DisplayState),
    /// Nothing to show; leave the previous state untouched.
    Skip,
}

/// Fetches usage, team, and analytics data from the dashboard API.
pub struct DashboardFetcher {
    client: Arc<dyn HttpClient>,
    settings: Arc<SettingsStore>,
}

impl DashboardFetcher {
    pub fn new(client: Arc<dyn HttpClient>, settings: Arc<SettingsStore>) -> Self {
        Self { client, settings }
    }

    /// Run one full usage cycle. This is a failure boundary: every error is
    /// folded into the outcome, nothing propagates.
    pub async fn run_cycle(&self) -> CycleOutcome {
        match self.try_cycle().await {
            Ok(snapshot) => CycleOutcome::Publish(DisplayState::Ready(snapshot)),
            Err(FetchError::NotConfigured) => {
                tracing::debug!("usage cycle skipped: no credential configured");
                CycleOutcome::Skip
            }
            Err(FetchError::Unauthorized) => {
                tracing::warn!("usage cycle: session cookie rejected");
                CycleOutcome::Publish(DisplayState::Unauthorized)
            }
            Err(e) => {
                tracing::warn!("usage cycle failed: {e}");
                CycleOutcome::Publish(DisplayState::Error)
            }
        }
    }

    async fn try_cycle(&self) -> Result<DashboardSnapshot, FetchError> {
        let settings = self.settings.get();
        let cookie = settings.cookie.clone();
        if cookie.is_empty() {
            return Err(FetchError::NotConfigured);
        }

        // Explicit identifier wins over cookie derivation
        let user_id = if settings.user_id.is_empty() {
            user_id_from_cookie(&cookie).ok_or(FetchError::NotConfigured)?
        } else {
            settings.user_id.clone()
        };
        tracing::debug!(%user_id, "starting usage cycle");

        let usage = self.fetch_usage(&cookie, &user_id).await?;

        // Team and analytics are best-effort: failures clear the optional
        // fields but never abort the cycle.
        let team_info = match self.fetch_team_info(&cookie).await {
            Ok(team) => team,
            Err(e) => {
                tracing::debug!("team info unavailable: {e}");
                None
            }
        };

        let user_analytics = match &team_info {
            Some(team) => match self.fetch_user_analytics(&cookie, team.id).await {
                Ok(analytics) => Some(analytics),
                Err(e) => {
                    tracing::debug!("user analytics unavailable: {e}");
                    None
                }
            },
            None => None,
        };

        Ok(DashboardSnapshot {
            usage,
            team_info,
            user_analytics,
            monthly_quota: settings.effective_monthly_quota(),
        })
    }

    async fn fetch_usage(&self, cookie: &str, user_id: &str) -> Result<UsageSnapshot, FetchError> {
        let url = format!("{USAGE_URL}?user={user_id}");
        let response = self
            .client
            .request(RequestSpec::get(url).with_cookie(cookie))
            .await?;

        if response.status == 401 {
            return Err(FetchError::Unauthorized);
        }
        let payload = response.json()?;
        // Some auth failures come back as 200 with an error body
        if payload.get("statusCode").and_then(|v| v.as_i64()) == Some(401) {
            return Err(FetchError::Unauthorized);
        }
        if response.status != 200 {
            return Err(FetchError::Status(response.status));
        }

        Ok(UsageSnapshot::from_payload(&payload))
    }

    async fn fetch_team_info(&self, cookie: &str) -> Result<Option<TeamInfo>, FetchError> {
        let spec = RequestSpec::post(TEAMS_URL, "{}")
            .with_cookie(cookie)
            .with_header("content-type", "application/json")
            .with_header("origin", "https://cursor.com")
            .with_header("referer", "https://cursor.com/analytics");
        let response = self.client.request(spec).await?;
        if response.status != 200 {
            return Err(FetchError::Status(response.status));
        }

        let payload = response.json()?;
        let first = payload
            .get("teams")
            .and_then(|v| v.as_array())
            .and_then(|teams| teams.first());
        let team = match first {
            Some(team) => team,
            None => {
                tracing::debug!("account has no teams");
                return Ok(None);
            }
        };

        let id = team.get("id").and_then(|v| v.as_i64());
        let name = team.get("name").and_then(|v| v.as_str());
        match (id, name) {
            (Some(id), Some(name)) => Ok(Some(TeamInfo {
                id,
                name: name.to_string(),
            })),
            _ => Ok(None),
        }
    }

    async fn fetch_user_analytics(
        &self,
        cookie: &str,
        team_id: i64,
    ) -> Result<UserAnalytics, FetchError> {
        let (start_ms, end_ms) = analytics_window(Local::now().date_naive());
        let body = json!({
            "teamId": team_id,
            "userId": 0,
            "startDate": start_ms.to_string(),
            "endDate": end_ms.to_string(),
        });

        let spec = RequestSpec::post(ANALYTICS_URL, body.to_string())
            .with_cookie(cookie)
            .with_header("content-type", "application/json")
            .with_header("origin", "https://cursor.com")
            .with_header("referer", "https://cursor.com/analytics");
        let response = self.client.request(spec).await?;
        if response.status != 200 {
            return Err(FetchError::Status(response.status));
        }

        let analytics: UserAnalytics = serde_json::from_str(&response.body)
            .map_err(|e| RequestError::BadBody(format!("analytics body: {e}")))?;
        Ok(analytics)
    }

    /// Refresh the persisted account profile from the auth endpoint.
    /// Best-effort; only profiles carrying a `sub` are saved.
    pub async fn update_account_profile(&self) {
        let cookie = self.settings.get().cookie;
        if cookie.is_empty() {
            tracing::debug!("account profile refresh skipped: no credential");
            return;
        }

        let result = self
            .client
            .request(RequestSpec::get(AUTH_ME_URL).with_cookie(&cookie))
            .await;
        let response = match result {
            Ok(response) if response.status == 200 => response,
            Ok(response) => {
                tracing::debug!(status = response.status, "account profile fetch failed");
                return;
            }
            Err(e) => {
                tracing::debug!("account profile fetch failed: {e}");
                return;
            }
        };

        match serde_json::from_str::<AccountProfile>(&response.body) {
            Ok(profile) if profile.sub.is_some() => {
                tracing::debug!(sub = ?profile.sub, "account profile updated");
                self.settings.set_user(Some(profile));
            }
            Ok(_) => tracing::debug!("auth response carried no account id"),
            Err(e) => tracing::debug!("malformed account profile: {e}"),
        }
    }
}

/// Trailing seven-day analytics window: [today-8d, today-1d] at local
/// midnight, as epoch milliseconds.
fn analytics_window(today: chrono::NaiveDate) -> (i64, i64) {
    let midnight = |date: chrono::NaiveDate| {
        let naive = date.and_time(NaiveTime::MIN);
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.timestamp_millis())
            .unwrap_or_else(|| naive.and_utc().timestamp_millis())
    };
    (
        midnight(today - Duration::days(8)),
        midnight(today - Duration::days(1)),
    )
}
