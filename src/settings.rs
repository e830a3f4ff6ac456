//! Settings management for CursorBar
//!
//! Persistent configuration plus change notification. Watchers subscribe
//! per key and receive a callback whenever a write actually changes the
//! value; the returned token releases the watcher.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::core::AccountProfile;

pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_MONTHLY_QUOTA: i64 = 500;

/// Persisted settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Dashboard session cookie.
    pub cookie: String,

    /// Explicit account identifier; derived from the cookie when empty.
    pub user_id: String,

    /// Premium requests included in the plan per month.
    pub monthly_quota: i64,

    /// Usage refresh period in seconds.
    pub update_interval_secs: u64,

    /// Whether the editor update checker runs.
    pub check_update: bool,

    /// Verbose engine logging.
    pub debug_mode: bool,

    /// Edge-triggered: writing true requests one immediate update check;
    /// the engine resets it to false after consuming it.
    pub trigger_check_update: bool,

    /// Last-known account profile from the auth endpoint.
    pub user: Option<AccountProfile>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cookie: String::new(),
            user_id: String::new(),
            monthly_quota: DEFAULT_MONTHLY_QUOTA,
            update_interval_secs: DEFAULT_UPDATE_INTERVAL_SECS,
            check_update: true,
            debug_mode: false,
            trigger_check_update: false,
            user: None,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("CursorBar").join("settings.json"))
    }

    fn load_from(path: &PathBuf) -> Self {
        if path.exists() {
            if let Ok(content) = std::fs::read_to_string(path) {
                if let Ok(settings) = serde_json::from_str(&content) {
                    return settings;
                }
            }
        }
        Self::default()
    }

    /// Save settings to disk
    pub fn save_to(&self, path: &PathBuf) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Refresh interval with non-positive values clamped to the default.
    pub fn effective_interval_secs(&self) -> u64 {
        if self.update_interval_secs == 0 {
            DEFAULT_UPDATE_INTERVAL_SECS
        } else {
            self.update_interval_secs
        }
    }

    /// Monthly quota with non-positive values clamped to the default.
    pub fn effective_monthly_quota(&self) -> i64 {
        if self.monthly_quota <= 0 {
            DEFAULT_MONTHLY_QUOTA
        } else {
            self.monthly_quota
        }
    }
}

/// Keys a watcher can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    Cookie,
    UserId,
    MonthlyQuota,
    UpdateIntervalSecs,
    CheckUpdate,
    DebugMode,
    TriggerCheckUpdate,
    User,
}

impl SettingKey {
    pub fn name(&self) -> &'static str {
        match self {
            SettingKey::Cookie => "cookie",
            SettingKey::UserId => "user-id",
            SettingKey::MonthlyQuota => "monthly-quota",
            SettingKey::UpdateIntervalSecs => "update-interval",
            SettingKey::CheckUpdate => "check-update",
            SettingKey::DebugMode => "debug-mode",
            SettingKey::TriggerCheckUpdate => "trigger-check-update",
            SettingKey::User => "user",
        }
    }
}

/// Token returned by [`SettingsStore::subscribe`]; release it with
/// [`SettingsStore::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchToken(u64);

type WatchCallback = Arc<dyn Fn(SettingKey) + Send + Sync>;

struct Watcher {
    key: SettingKey,
    callback: WatchCallback,
}

/// Settings with change notification and optional persistence.
pub struct SettingsStore {
    values: Mutex<Settings>,
    watchers: Mutex<HashMap<u64, Watcher>>,
    next_token: AtomicU64,
    path: Option<PathBuf>,
}

impl SettingsStore {
    /// Store backed by the on-disk settings file.
    pub fn open() -> Self {
        let path = Settings::settings_path();
        let values = match &path {
            Some(path) => Settings::load_from(path),
            None => Settings::default(),
        };
        Self::with_values(values, path)
    }

    /// Store without persistence.
    pub fn in_memory(values: Settings) -> Self {
        Self::with_values(values, None)
    }

    /// Store persisted at an explicit path.
    pub fn at_path(path: PathBuf) -> Self {
        let values = Settings::load_from(&path);
        Self::with_values(values, Some(path))
    }

    fn with_values(values: Settings, path: Option<PathBuf>) -> Self {
        Self {
            values: Mutex::new(values),
            watchers: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
            path,
        }
    }

    /// Snapshot of the current settings.
    pub fn get(&self) -> Settings {
        self.values.lock().unwrap().clone()
    }

    /// Subscribe to changes of one key.
    pub fn subscribe(
        &self,
        key: SettingKey,
        callback: impl Fn(SettingKey) + Send + Sync + 'static,
    ) -> WatchToken {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.watchers.lock().unwrap().insert(
            token,
            Watcher {
                key,
                callback: Arc::new(callback),
            },
        );
        WatchToken(token)
    }

    /// Release a watcher. Releasing an unknown token is a no-op.
    pub fn unsubscribe(&self, token: WatchToken) {
        self.watchers.lock().unwrap().remove(&token.0);
    }

    pub fn set_cookie(&self, cookie: impl Into<String>) {
        self.update(SettingKey::Cookie, |s| {
            let cookie = cookie.into();
            if s.cookie == cookie {
                return false;
            }
            s.cookie = cookie;
            true
        });
    }

    pub fn set_user_id(&self, user_id: impl Into<String>) {
        self.update(SettingKey::UserId, |s| {
            let user_id = user_id.into();
            if s.user_id == user_id {
                return false;
            }
            s.user_id = user_id;
            true
        });
    }

    pub fn set_monthly_quota(&self, quota: i64) {
        self.update(SettingKey::MonthlyQuota, |s| {
            if s.monthly_quota == quota {
                return false;
            }
            s.monthly_quota = quota;
            true
        });
    }

    pub fn set_update_interval_secs(&self, secs: u64) {
        self.update(SettingKey::UpdateIntervalSecs, |s| {
            if s.update_interval_secs == secs {
                return false;
            }
            s.update_interval_secs = secs;
            true
        });
    }

    pub fn set_check_update(&self, enabled: bool) {
        self.update(SettingKey::CheckUpdate, |s| {
            if s.check_update == enabled {
                return false;
            }
            s.check_update = enabled;
            true
        });
    }

    pub fn set_debug_mode(&self, enabled: bool) {
        self.update(SettingKey::DebugMode, |s| {
            if s.debug_mode == enabled {
                return false;
            }
            s.debug_mode = enabled;
            true
        });
    }

    pub fn set_trigger_check_update(&self, triggered: bool) {
        self.update(SettingKey::TriggerCheckUpdate, |s| {
            if s.trigger_check_update == triggered {
                return false;
            }
            s.trigger_check_update = triggered;
            true
        });
    }

    pub fn set_user(&self, profile: Option<AccountProfile>) {
        self.update(SettingKey::User, |s| {
            if s.user == profile {
                return false;
            }
            s.user = profile;
            true
        });
    }

    /// Apply a mutation; notify watchers and persist only when the closure
    /// reports an actual change.
    fn update(&self, key: SettingKey, mutate: impl FnOnce(&mut Settings) -> bool) {
        let changed = {
            let mut values = self.values.lock().unwrap();
            let changed = mutate(&mut values);
            if changed {
                if let Some(path) = &self.path {
                    if let Err(e) = values.save_to(path) {
                        tracing::warn!("failed to persist settings: {e}");
                    }
                }
            }
            changed
        };
        if changed {
            self.notify(key);
        }
    }

    /// Invoke watchers for a key with no locks held, so a callback may
    /// write back into the store.
    fn notify(&self, key: SettingKey) {
        let callbacks: Vec<WatchCallback> = {
            let watchers = self.watchers.lock().unwrap();
            watchers
                .values()
                .filter(|w| w.key == key)
                .map(|w| Arc::clone(&w.callback))
                .collect()
        };
        for callback in callbacks {
            callback(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.update_interval_secs, 30);
        assert_eq!(settings.monthly_quota, 500);
        assert!(settings.check_update);
        assert!(!settings.trigger_check_update);
        assert!(settings.cookie.is_empty());
    }

    #[test]
    fn test_effective_values_clamp() {
        let mut settings = Settings::default();
        settings.update_interval_secs = 0;
        settings.monthly_quota = -3;
        assert_eq!(settings.effective_interval_secs(), 30);
        assert_eq!(settings.effective_monthly_quota(), 500);

        settings.update_interval_secs = 90;
        settings.monthly_quota = 1000;
        assert_eq!(settings.effective_interval_secs(), 90);
        assert_eq!(settings.effective_monthly_quota(), 1000);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::at_path(path.clone());
        store.set_cookie("session=abc");
        store.set_monthly_quota(750);

        let reloaded = SettingsStore::at_path(path);
        let settings = reloaded.get();
        assert_eq!(settings.cookie, "session=abc");
        assert_eq!(settings.monthly_quota, 750);
    }

    #[test]
    fn test_watchers_fire_only_on_change() {
        let store = SettingsStore::in_memory(Settings::default());
        let fired = Arc::new(AtomicUsize::new(0));

        let fired_clone = Arc::clone(&fired);
        let token = store.subscribe(SettingKey::MonthlyQuota, move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        store.set_monthly_quota(600);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Same value again: no notification
        store.set_monthly_quota(600);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Different key: no notification
        store.set_cookie("c=1");
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        store.unsubscribe(token);
        store.set_monthly_quota(700);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_watcher_may_write_back_into_store() {
        // The edge-triggered flag pattern: the consumer resets the flag
        // from inside its own watcher.
        let store = Arc::new(SettingsStore::in_memory(Settings::default()));
        let consumed = Arc::new(AtomicUsize::new(0));

        let store_clone = Arc::clone(&store);
        let consumed_clone = Arc::clone(&consumed);
        store.subscribe(SettingKey::TriggerCheckUpdate, move |_| {
            if store_clone.get().trigger_check_update {
                store_clone.set_trigger_check_update(false);
                consumed_clone.fetch_add(1, Ordering::SeqCst);
            }
        });

        store.set_trigger_check_update(true);
        assert_eq!(consumed.load(Ordering::SeqCst), 1);
        assert!(!store.get().trigger_check_update);

        // Re-triggering works because the consumer reset the flag
        store.set_trigger_check_update(true);
        assert_eq!(consumed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_unknown_token_is_noop() {
        let store = SettingsStore::in_memory(Settings::default());
        store.unsubscribe(WatchToken(999));
    }
}
