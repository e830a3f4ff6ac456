//! Editor update checker
//!
//! Polls the Cursor update API for a newer release than the locally
//! installed editor and drives the single update notification: raise it
//! for a new version, keep it for an already-notified version, clear it
//! once the user is up to date.

mod parsers;
mod system;

pub use parsers::extract_version;
pub use system::{device_hash, platform_tag, HostProbe, SystemProbe};

use std::cmp::Ordering;
use std::sync::Arc;

use crate::core::compare_versions;
use crate::net::{HttpClient, RequestSpec};
use crate::notify::{NotificationCenter, NotificationRequest};
use crate::settings::SettingsStore;

const UPDATE_API_HOST: &str = "api2.cursor.sh";
const CHANGELOG_URL: &str = "https://www.cursor.com/changelog";

/// What one update-check cycle concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateCheckOutcome {
    /// Update checking is disabled in settings.
    Disabled,
    /// A required input (local version, machine id, remote response) was
    /// unavailable; notification state untouched.
    Inconclusive,
    /// Local version matches or exceeds the remote one.
    UpToDate { local: String },
    /// A newer version exists.
    UpdateAvailable { local: String, remote: String },
}

/// Checks the remote update API and manages the update notification.
pub struct UpdateChecker {
    client: Arc<dyn HttpClient>,
    settings: Arc<SettingsStore>,
    notifications: Arc<NotificationCenter>,
    probe: Arc<dyn SystemProbe>,
}

impl UpdateChecker {
    pub fn new(
        client: Arc<dyn HttpClient>,
        settings: Arc<SettingsStore>,
        notifications: Arc<NotificationCenter>,
        probe: Arc<dyn SystemProbe>,
    ) -> Self {
        Self {
            client,
            settings,
            notifications,
            probe,
        }
    }

    /// Run one update-check cycle. A failure boundary: every outcome is
    /// logged, nothing propagates, notification state only changes on a
    /// conclusive comparison.
    pub async fn run_cycle(&self) -> UpdateCheckOutcome {
        if !self.settings.get().check_update {
            tracing::debug!("update checking is disabled");
            return UpdateCheckOutcome::Disabled;
        }

        let local = match self.probe.editor_version().await {
            Some(version) => version,
            None => {
                tracing::debug!("could not determine local editor version");
                return UpdateCheckOutcome::Inconclusive;
            }
        };

        let machine_id = match self.probe.machine_id().await {
            Some(id) => id,
            None => {
                tracing::debug!("could not determine machine id");
                return UpdateCheckOutcome::Inconclusive;
            }
        };
        let hash = device_hash(&machine_id);

        let arch = self.probe.machine_arch().await.unwrap_or_default();
        let platform = platform_tag(&arch);
        tracing::debug!(%local, platform, "checking for editor updates");

        let url = format!(
            "https://{UPDATE_API_HOST}/updates/api/update/{platform}/cursor/{local}/{hash}/prerelease"
        );
        let spec = RequestSpec::get(url)
            .with_header("host", UPDATE_API_HOST)
            .with_header("user-agent", format!("Cursor/{local}"))
            .with_header("sec-fetch-site", "none")
            .with_header("sec-fetch-mode", "no-cors")
            .with_header("sec-fetch-dest", "empty")
            .with_header("accept-language", "en-US")
            .with_header("priority", "u=4, i");

        let response = match self.client.request(spec).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("update check request failed: {e}");
                return UpdateCheckOutcome::Inconclusive;
            }
        };

        // 204 is the API's "already current" answer, not a payload
        if response.status == 204 {
            tracing::debug!(%local, "no update available");
            return UpdateCheckOutcome::UpToDate { local };
        }
        if response.status != 200 {
            tracing::warn!(status = response.status, "update API returned an error");
            return UpdateCheckOutcome::Inconclusive;
        }

        let remote = match extract_version(&response.body) {
            Some(version) => version,
            None => {
                tracing::warn!("could not extract version from update response");
                return UpdateCheckOutcome::Inconclusive;
            }
        };
        tracing::debug!(%remote, %local, "remote version fetched");

        if compare_versions(&remote, &local) == Ordering::Greater {
            if self.notifications.is_active_for(&remote) {
                tracing::debug!(%remote, "notification for this version is already active");
            } else {
                self.notifications
                    .show(&remote, &update_notification(&remote, &local));
            }
            UpdateCheckOutcome::UpdateAvailable { local, remote }
        } else {
            // The user caught up; withdraw any lingering notification
            self.notifications.clear();
            UpdateCheckOutcome::UpToDate { local }
        }
    }
}

fn update_notification(remote: &str, local: &str) -> NotificationRequest {
    NotificationRequest {
        title: "Cursor Update Available".to_string(),
        body: format!(
            "A new version ({remote}) of Cursor is available. \
             You are currently using version {local}."
        ),
        action_label: "View Changelog".to_string(),
        action_url: CHANGELOG_URL.to_string(),
    }
}
