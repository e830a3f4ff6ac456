//! Polling engine
//!
//! Owns the two recurring timers (usage refresh, update check), the
//! settings subscriptions, and the shared display state. All mutation is
//! funneled through the cycle methods; collaborators only signal intent
//! through engine methods or settings writes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;

use crate::core::DisplayState;
use crate::dashboard::{CycleOutcome, DashboardFetcher};
use crate::net::HttpClient;
use crate::notify::{NotificationCenter, NotificationSink};
use crate::settings::{SettingKey, SettingsStore, WatchToken};
use crate::update::{SystemProbe, UpdateChecker};

/// Update checks run on a fixed half-hour period.
pub const UPDATE_CHECK_INTERVAL: Duration = Duration::from_secs(1800);

/// Receives each published display state.
pub trait Renderer: Send + Sync {
    fn render(&self, state: &DisplayState);
}

enum EngineEvent {
    RefreshUsage,
    RefreshAccountProfile,
    RestartUsageTimer,
    RestartUpdateTimer,
    TriggerRequested,
}

struct EngineInner {
    settings: Arc<SettingsStore>,
    fetcher: DashboardFetcher,
    checker: UpdateChecker,
    notifications: Arc<NotificationCenter>,
    renderer: Arc<dyn Renderer>,
    display: Mutex<DisplayState>,
    usage_timer: Mutex<Option<JoinHandle<()>>>,
    update_timer: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl EngineInner {
    /// Run one usage cycle and publish its outcome. The publish replaces
    /// the whole state; a skipped cycle leaves the previous state alone.
    async fn run_usage_cycle(self: &Arc<Self>) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        match self.fetcher.run_cycle().await {
            CycleOutcome::Publish(state) => {
                *self.display.lock().unwrap() = state.clone();
                self.renderer.render(&state);
            }
            CycleOutcome::Skip => {}
        }
    }

    async fn run_update_cycle(self: &Arc<Self>) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        self.checker.run_cycle().await;
    }

    /// (Re)start the usage timer with the currently configured interval.
    /// The previous timer handle is always cancelled first.
    fn restart_usage_timer(self: &Arc<Self>) {
        let mut slot = self.usage_timer.lock().unwrap();
        if let Some(handle) = slot.take() {
            tracing::debug!("cancelling existing usage timer");
            handle.abort();
        }
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let interval = self.settings.get().effective_interval_secs();
        tracing::debug!(interval_secs = interval, "starting usage timer");
        let inner = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(interval)).await;
                inner.run_usage_cycle().await;
            }
        }));
    }

    /// (Re)start or tear down the update timer depending on settings.
    /// When (re)started it checks immediately, then on the fixed period.
    fn restart_update_timer(self: &Arc<Self>) {
        let mut slot = self.update_timer.lock().unwrap();
        if let Some(handle) = slot.take() {
            tracing::debug!("cancelling existing update timer");
            handle.abort();
        }
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if !self.settings.get().check_update {
            tracing::debug!("update checking disabled, timer not started");
            return;
        }

        tracing::debug!("starting update timer");
        let inner = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            inner.run_update_cycle().await;
            loop {
                tokio::time::sleep(UPDATE_CHECK_INTERVAL).await;
                inner.run_update_cycle().await;
            }
        }));
    }

    /// Consume the edge-triggered flag: a rising edge runs one immediate
    /// check and resets the flag so the next write re-triggers.
    async fn consume_trigger(self: &Arc<Self>) {
        if !self.settings.get().trigger_check_update {
            return;
        }
        self.settings.set_trigger_check_update(false);
        if !self.settings.get().check_update {
            tracing::debug!("manual check requested while update checking is disabled");
            return;
        }
        self.run_update_cycle().await;
    }
}

/// The polling engine. Construct with [`Engine::new`], call
/// [`Engine::start`], and [`Engine::dispose`] when done.
pub struct Engine {
    inner: Arc<EngineInner>,
    events: UnboundedSender<EngineEvent>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
    watch_tokens: Mutex<Vec<WatchToken>>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<EngineEvent>>>,
}

impl Engine {
    pub fn new(
        settings: Arc<SettingsStore>,
        client: Arc<dyn HttpClient>,
        renderer: Arc<dyn Renderer>,
        sink: Arc<dyn NotificationSink>,
        probe: Arc<dyn SystemProbe>,
    ) -> Self {
        let notifications = Arc::new(NotificationCenter::new(sink));
        let fetcher = DashboardFetcher::new(Arc::clone(&client), Arc::clone(&settings));
        let checker = UpdateChecker::new(
            client,
            Arc::clone(&settings),
            Arc::clone(&notifications),
            probe,
        );
        let (events, events_rx) = mpsc::unbounded_channel();

        Self {
            inner: Arc::new(EngineInner {
                settings,
                fetcher,
                checker,
                notifications,
                renderer,
                display: Mutex::new(DisplayState::Loading),
                usage_timer: Mutex::new(None),
                update_timer: Mutex::new(None),
                disposed: AtomicBool::new(false),
            }),
            events,
            event_loop: Mutex::new(None),
            watch_tokens: Mutex::new(Vec::new()),
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Subscribe to settings, start both timers, and kick off the first
    /// fetches. Cycles triggered here run concurrently with the timers;
    /// each publishes a complete snapshot, so the last writer wins.
    pub fn start(&self) {
        self.subscribe_settings();

        let mut rx = self
            .events_rx
            .lock()
            .unwrap()
            .take()
            .expect("engine already started");
        let inner = Arc::clone(&self.inner);
        *self.event_loop.lock().unwrap() = Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    EngineEvent::RefreshUsage => inner.run_usage_cycle().await,
                    EngineEvent::RefreshAccountProfile => {
                        inner.fetcher.update_account_profile().await
                    }
                    EngineEvent::RestartUsageTimer => inner.restart_usage_timer(),
                    EngineEvent::RestartUpdateTimer => inner.restart_update_timer(),
                    EngineEvent::TriggerRequested => inner.consume_trigger().await,
                }
            }
        }));

        self.inner.restart_usage_timer();
        self.inner.restart_update_timer();

        // Immediate first fetch; the update timer already checks on start
        let _ = self.events.send(EngineEvent::RefreshUsage);
        let _ = self.events.send(EngineEvent::RefreshAccountProfile);
    }

    fn subscribe_settings(&self) {
        let mut tokens = self.watch_tokens.lock().unwrap();
        let subscribe = |key: SettingKey, event: fn() -> EngineEvent| {
            let sender = self.events.clone();
            self.inner.settings.subscribe(key, move |_| {
                let _ = sender.send(event());
            })
        };

        tokens.push(subscribe(SettingKey::UpdateIntervalSecs, || {
            EngineEvent::RestartUsageTimer
        }));
        tokens.push(subscribe(SettingKey::MonthlyQuota, || {
            EngineEvent::RefreshUsage
        }));
        tokens.push(subscribe(SettingKey::UserId, || EngineEvent::RefreshUsage));
        tokens.push(subscribe(SettingKey::CheckUpdate, || {
            EngineEvent::RestartUpdateTimer
        }));
        tokens.push(subscribe(SettingKey::TriggerCheckUpdate, || {
            EngineEvent::TriggerRequested
        }));

        // Cookie changes invalidate both the snapshot and the profile
        let sender = self.events.clone();
        tokens.push(self.inner.settings.subscribe(SettingKey::Cookie, move |_| {
            let _ = sender.send(EngineEvent::RefreshUsage);
            let _ = sender.send(EngineEvent::RefreshAccountProfile);
        }));

        let settings = Arc::clone(&self.inner.settings);
        tokens.push(self.inner.settings.subscribe(SettingKey::DebugMode, move |_| {
            tracing::info!(enabled = settings.get().debug_mode, "debug mode changed");
        }));
    }

    /// Current display state snapshot.
    pub fn display_state(&self) -> DisplayState {
        self.inner.display.lock().unwrap().clone()
    }

    /// Run a usage cycle now, independent of the timer.
    pub async fn refresh_now(&self) {
        self.inner.run_usage_cycle().await;
    }

    /// Tear everything down: both timers, the event loop, every settings
    /// subscription, and any tracked notification. Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!("disposing engine");

        if let Some(handle) = self.inner.usage_timer.lock().unwrap().take() {
            handle.abort();
        }
        if let Some(handle) = self.inner.update_timer.lock().unwrap().take() {
            handle.abort();
        }
        if let Some(handle) = self.event_loop.lock().unwrap().take() {
            handle.abort();
        }

        for token in self.watch_tokens.lock().unwrap().drain(..) {
            self.inner.settings.unsubscribe(token);
        }

        self.inner.notifications.clear();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{HttpResponse, RequestError, RequestSpec};
    use crate::notify::mock::MockSink;
    use crate::settings::Settings;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;

    struct StubProbe;

    #[async_trait]
    impl SystemProbe for StubProbe {
        async fn editor_version(&self) -> Option<String> {
            Some("0.46.9".to_string())
        }
        async fn machine_arch(&self) -> Option<String> {
            Some("x86_64".to_string())
        }
        async fn machine_id(&self) -> Option<String> {
            Some("m1".to_string())
        }
    }

    /// Counts requests per URL prefix; serves a healthy usage payload and
    /// a 204 for everything on the update host.
    struct CountingClient {
        requests: Mutex<Vec<String>>,
    }

    impl CountingClient {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
            })
        }

        fn usage_calls(&self) -> usize {
            self.count_prefix("https://www.cursor.com/api/usage")
        }

        fn update_calls(&self) -> usize {
            self.count_prefix("https://api2.cursor.sh/")
        }

        fn count_prefix(&self, prefix: &str) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|u| u.starts_with(prefix))
                .count()
        }
    }

    #[async_trait]
    impl HttpClient for CountingClient {
        async fn request(&self, spec: RequestSpec) -> Result<HttpResponse, RequestError> {
            self.requests.lock().unwrap().push(spec.url.clone());
            if spec.url.starts_with("https://api2.cursor.sh/") {
                return Ok(HttpResponse {
                    status: 204,
                    body: String::new(),
                    headers: HashMap::new(),
                });
            }
            if spec.url.starts_with("https://www.cursor.com/api/usage") {
                return Ok(HttpResponse {
                    status: 200,
                    body: r#"{"gpt-4":{"numRequests":7,"numTokens":100}}"#.to_string(),
                    headers: HashMap::new(),
                });
            }
            Ok(HttpResponse {
                status: 200,
                body: r#"{"teams":[]}"#.to_string(),
                headers: HashMap::new(),
            })
        }
    }

    struct CountingRenderer {
        rendered: AtomicUsize,
    }

    impl Renderer for CountingRenderer {
        fn render(&self, _state: &DisplayState) {
            self.rendered.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn engine_with(
        client: Arc<CountingClient>,
        settings: Settings,
    ) -> (Engine, Arc<SettingsStore>, Arc<CountingRenderer>) {
        let store = Arc::new(SettingsStore::in_memory(settings));
        let renderer = Arc::new(CountingRenderer {
            rendered: AtomicUsize::new(0),
        });
        let engine = Engine::new(
            Arc::clone(&store),
            client,
            renderer.clone(),
            MockSink::new(),
            Arc::new(StubProbe),
        );
        (engine, store, renderer)
    }

    async fn settle() {
        // Let spawned tasks process pending work
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    fn configured() -> Settings {
        Settings {
            cookie: "session=user_1::tok".to_string(),
            check_update: true,
            update_interval_secs: 30,
            ..Settings::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_runs_immediate_cycles() {
        let client = CountingClient::new();
        let (engine, _, renderer) = engine_with(Arc::clone(&client), configured());

        engine.start();
        settle().await;

        assert_eq!(client.usage_calls(), 1);
        // Update timer checks immediately on start
        assert_eq!(client.update_calls(), 1);
        assert!(renderer.rendered.load(Ordering::SeqCst) >= 1);
        assert!(matches!(engine.display_state(), DisplayState::Ready(_)));

        engine.dispose();
    }

    #[tokio::test(start_paused = true)]
    async fn test_usage_timer_fires_on_interval() {
        let client = CountingClient::new();
        let (engine, _, _) = engine_with(Arc::clone(&client), configured());

        engine.start();
        settle().await;
        let baseline = client.usage_calls();

        tokio::time::advance(Duration::from_secs(31)).await;
        settle().await;
        assert_eq!(client.usage_calls(), baseline + 1);

        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(client.usage_calls(), baseline + 2);

        engine.dispose();
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_change_restarts_usage_timer() {
        let client = CountingClient::new();
        let (engine, store, _) = engine_with(Arc::clone(&client), configured());

        engine.start();
        settle().await;
        let baseline = client.usage_calls();

        store.set_update_interval_secs(5);
        settle().await;

        tokio::time::advance(Duration::from_secs(6)).await;
        settle().await;
        assert_eq!(client.usage_calls(), baseline + 1);

        engine.dispose();
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_timer_not_started_when_disabled() {
        let client = CountingClient::new();
        let mut settings = configured();
        settings.check_update = false;
        let (engine, _, _) = engine_with(Arc::clone(&client), settings);

        engine.start();
        settle().await;
        tokio::time::advance(UPDATE_CHECK_INTERVAL).await;
        settle().await;

        assert_eq!(client.update_calls(), 0);
        engine.dispose();
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabling_check_update_tears_down_timer() {
        let client = CountingClient::new();
        let (engine, store, _) = engine_with(Arc::clone(&client), configured());

        engine.start();
        settle().await;
        assert_eq!(client.update_calls(), 1);

        store.set_check_update(false);
        settle().await;
        tokio::time::advance(UPDATE_CHECK_INTERVAL).await;
        settle().await;
        assert_eq!(client.update_calls(), 1);

        // Re-enabling checks immediately again
        store.set_check_update(true);
        settle().await;
        assert_eq!(client.update_calls(), 2);

        engine.dispose();
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_flag_runs_one_check_and_resets() {
        let client = CountingClient::new();
        let (engine, store, _) = engine_with(Arc::clone(&client), configured());

        engine.start();
        settle().await;
        let baseline = client.update_calls();

        store.set_trigger_check_update(true);
        settle().await;
        assert_eq!(client.update_calls(), baseline + 1);
        // Engine reset the flag after consuming it
        assert!(!store.get().trigger_check_update);

        // The falling edge (our reset) must not trigger another check
        settle().await;
        assert_eq!(client.update_calls(), baseline + 1);

        // Rising edge works repeatedly
        store.set_trigger_check_update(true);
        settle().await;
        assert_eq!(client.update_calls(), baseline + 2);

        engine.dispose();
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_while_disabled_does_not_check() {
        let client = CountingClient::new();
        let mut settings = configured();
        settings.check_update = false;
        let (engine, store, _) = engine_with(Arc::clone(&client), settings);

        engine.start();
        settle().await;

        store.set_trigger_check_update(true);
        settle().await;
        assert_eq!(client.update_calls(), 0);
        // The flag is still consumed
        assert!(!store.get().trigger_check_update);

        engine.dispose();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cookie_change_triggers_refresh() {
        let client = CountingClient::new();
        let (engine, store, _) = engine_with(Arc::clone(&client), configured());

        engine.start();
        settle().await;
        let baseline = client.usage_calls();

        store.set_cookie("session=user_2::tok");
        settle().await;
        assert_eq!(client.usage_calls(), baseline + 1);

        engine.dispose();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_stops_timers_and_releases_watchers() {
        let client = CountingClient::new();
        let (engine, store, _) = engine_with(Arc::clone(&client), configured());

        engine.start();
        settle().await;
        engine.dispose();

        let usage_after = client.usage_calls();
        let update_after = client.update_calls();

        // No further fetches after disposal, no matter how long we wait
        tokio::time::advance(UPDATE_CHECK_INTERVAL * 4).await;
        settle().await;
        assert_eq!(client.usage_calls(), usage_after);
        assert_eq!(client.update_calls(), update_after);

        // Settings writes no longer reach the engine
        store.set_monthly_quota(900);
        store.set_trigger_check_update(true);
        settle().await;
        assert_eq!(client.usage_calls(), usage_after);
        assert_eq!(client.update_calls(), update_after);

        // Dispose is idempotent
        engine.dispose();
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_refresh_is_independent_of_timer() {
        let client = CountingClient::new();
        let (engine, _, _) = engine_with(Arc::clone(&client), configured());

        engine.start();
        settle().await;
        let baseline = client.usage_calls();

        engine.refresh_now().await;
        assert_eq!(client.usage_calls(), baseline + 1);

        engine.dispose();
    }
}
