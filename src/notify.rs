//! Desktop notification lifecycle
//!
//! The engine tracks at most one "update available" notification at a
//! time. Replacing it tears the old handle and its destroy subscription
//! down first, and an external dismissal only clears engine state when the
//! dismissed handle is still the tracked one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Opaque handle for a shown notification.
pub type NotificationId = u64;

/// Token for a destroy-event subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestroyToken(pub u64);

/// Everything a sink needs to render one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    pub action_label: String,
    pub action_url: String,
}

/// Callback invoked when a notification is destroyed outside engine
/// control (e.g. the user dismisses it).
pub type DestroyCallback = Box<dyn Fn(NotificationId) + Send + Sync>;

/// Opaque notification service. Implementations must not invoke destroy
/// callbacks from within [`NotificationSink::destroy`]; the engine always
/// unsubscribes before destroying.
pub trait NotificationSink: Send + Sync {
    fn show(&self, request: &NotificationRequest) -> NotificationId;
    fn destroy(&self, id: NotificationId);
    fn subscribe_destroy(&self, id: NotificationId, callback: DestroyCallback) -> DestroyToken;
    /// Releasing an already-released token is a no-op.
    fn unsubscribe(&self, token: DestroyToken);
}

#[derive(Default)]
struct Tracked {
    notified_version: Option<String>,
    active_id: Option<NotificationId>,
    destroy_token: Option<DestroyToken>,
}

/// Tracks the single engine-owned notification.
pub struct NotificationCenter {
    inner: Arc<CenterInner>,
}

struct CenterInner {
    sink: Arc<dyn NotificationSink>,
    tracked: Mutex<Tracked>,
}

impl NotificationCenter {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            inner: Arc::new(CenterInner {
                sink,
                tracked: Mutex::new(Tracked::default()),
            }),
        }
    }

    /// Version the active notification was raised for, if any.
    pub fn notified_version(&self) -> Option<String> {
        let tracked = self.inner.tracked.lock().unwrap();
        if tracked.active_id.is_some() {
            tracked.notified_version.clone()
        } else {
            None
        }
    }

    /// True when a notification for exactly this version is still active.
    pub fn is_active_for(&self, version: &str) -> bool {
        self.notified_version().as_deref() == Some(version)
    }

    /// Show a notification for `version`, replacing any tracked one.
    pub fn show(&self, version: &str, request: &NotificationRequest) {
        let mut tracked = self.inner.tracked.lock().unwrap();
        Self::teardown(&self.inner.sink, &mut tracked);

        let id = self.inner.sink.show(request);
        let weak = Arc::downgrade(&self.inner);
        let token = self.inner.sink.subscribe_destroy(
            id,
            Box::new(move |destroyed| {
                if let Some(inner) = Weak::upgrade(&weak) {
                    CenterInner::on_external_destroy(&inner, destroyed);
                }
            }),
        );

        tracked.active_id = Some(id);
        tracked.destroy_token = Some(token);
        tracked.notified_version = Some(version.to_string());
        tracing::debug!(version, id, "notification shown");
    }

    /// Destroy the tracked notification, if any, and forget its version.
    pub fn clear(&self) {
        let mut tracked = self.inner.tracked.lock().unwrap();
        Self::teardown(&self.inner.sink, &mut tracked);
    }

    fn teardown(sink: &Arc<dyn NotificationSink>, tracked: &mut Tracked) {
        // Unsubscribe before destroy so the stale callback can never fire
        // against a handle that no longer represents the current one.
        if let Some(token) = tracked.destroy_token.take() {
            sink.unsubscribe(token);
        }
        if let Some(id) = tracked.active_id.take() {
            tracing::debug!(id, "destroying tracked notification");
            sink.destroy(id);
        }
        tracked.notified_version = None;
    }
}

impl CenterInner {
    fn on_external_destroy(self: &Arc<Self>, destroyed: NotificationId) {
        let mut tracked = self.tracked.lock().unwrap();
        if tracked.active_id == Some(destroyed) {
            tracing::debug!(id = destroyed, "tracked notification dismissed externally");
            tracked.active_id = None;
            tracked.destroy_token = None;
            tracked.notified_version = None;
        } else {
            // A replacement was already created before this destroy signal
            // arrived; the newer notification's lifecycle governs.
            tracing::debug!(id = destroyed, "ignoring destroy of superseded notification");
        }
    }
}

/// Sink that logs instead of talking to a desktop notification service.
pub struct LogSink {
    next_id: AtomicU64,
}

impl LogSink {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for LogSink {
    fn show(&self, request: &NotificationRequest) -> NotificationId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            "notification: {} - {} [{} -> {}]",
            request.title,
            request.body,
            request.action_label,
            request.action_url
        );
        id
    }

    fn destroy(&self, id: NotificationId) {
        tracing::debug!(id, "notification withdrawn");
    }

    fn subscribe_destroy(&self, _id: NotificationId, _callback: DestroyCallback) -> DestroyToken {
        DestroyToken(0)
    }

    fn unsubscribe(&self, _token: DestroyToken) {}
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct MockState {
        pub shown: Vec<(NotificationId, NotificationRequest)>,
        pub destroyed: Vec<NotificationId>,
        pub unsubscribed: Vec<DestroyToken>,
        pub callbacks: HashMap<u64, (NotificationId, DestroyCallback)>,
        next_id: u64,
        next_token: u64,
    }

    /// Recording sink that can simulate user dismissal.
    #[derive(Default)]
    pub struct MockSink {
        pub state: Mutex<MockState>,
    }

    impl MockSink {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Simulate the user dismissing a notification.
        pub fn dismiss(&self, id: NotificationId) {
            let callbacks: Vec<DestroyCallback> = {
                let mut state = self.state.lock().unwrap();
                let tokens: Vec<u64> = state
                    .callbacks
                    .iter()
                    .filter(|(_, (cb_id, _))| *cb_id == id)
                    .map(|(token, _)| *token)
                    .collect();
                tokens
                    .into_iter()
                    .filter_map(|token| state.callbacks.remove(&token))
                    .map(|(_, cb)| cb)
                    .collect()
            };
            for callback in callbacks {
                callback(id);
            }
        }

        pub fn active_subscriptions(&self) -> usize {
            self.state.lock().unwrap().callbacks.len()
        }
    }

    impl NotificationSink for MockSink {
        fn show(&self, request: &NotificationRequest) -> NotificationId {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let id = state.next_id;
            state.shown.push((id, request.clone()));
            id
        }

        fn destroy(&self, id: NotificationId) {
            self.state.lock().unwrap().destroyed.push(id);
        }

        fn subscribe_destroy(&self, id: NotificationId, callback: DestroyCallback) -> DestroyToken {
            let mut state = self.state.lock().unwrap();
            state.next_token += 1;
            let token = state.next_token;
            state.callbacks.insert(token, (id, callback));
            DestroyToken(token)
        }

        fn unsubscribe(&self, token: DestroyToken) {
            let mut state = self.state.lock().unwrap();
            state.unsubscribed.push(token);
            state.callbacks.remove(&token.0);
        }
    }
}
