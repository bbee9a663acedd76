//! Per-entry expiry watchers and the table of live watchers.

use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::lifecycle::Shared;
use crate::scope::{Scope, ScopeError};

/// Stop capability for exactly one watcher.
///
/// Dropping a handle stops its watcher as well.
pub(crate) struct WatcherHandle {
    id: u64,
    stop: Option<oneshot::Sender<()>>,
    armed: Arc<AtomicBool>,
}

impl WatcherHandle {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Lets the watcher remove its entry if its task is torn down before
    /// either branch runs. Until armed, teardown leaves the table alone.
    pub(crate) fn arm(&self) {
        self.armed.store(true, Ordering::Release);
    }

    /// Signals the watcher to stand down. Does not wait for it to exit.
    pub(crate) fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            // The watcher may already have exited.
            let _ = stop.send(());
        }
    }
}

/// Maps each key to the handle of its single live watcher.
pub(crate) struct WatcherTable<K> {
    handles: DashMap<K, WatcherHandle>,
}

impl<K> WatcherTable<K>
where
    K: Eq + Hash,
{
    pub(crate) fn new() -> Self {
        Self {
            handles: DashMap::new(),
        }
    }

    /// Locks the slot for `key`. The returned entry is the per-key critical
    /// section: nothing else can install, stop or expire a watcher for `key`
    /// until it is dropped.
    pub(crate) fn slot(&self, key: K) -> Entry<'_, K, WatcherHandle> {
        self.handles.entry(key)
    }

    /// Returns the id of the live watcher for `key`.
    pub(crate) fn get(&self, key: &K) -> Option<u64> {
        self.handles.get(key).map(|h| h.id())
    }

    pub(crate) fn count(&self) -> usize {
        self.handles.len()
    }
}

/// What a watcher races against its stop signal.
pub(crate) enum Trigger {
    /// Fires at a fixed monotonic instant.
    Timer(Instant),
    /// Fires when a scope derived from the caller's scope ends.
    Scope(Scope),
}

impl Trigger {
    /// A timer that fires after `lifetime`, saturating at the far future.
    pub(crate) fn after(lifetime: std::time::Duration) -> Self {
        let now = Instant::now();
        // Roughly thirty years, matching tokio's own far-future clamp.
        let far_future = now + std::time::Duration::from_secs(86400 * 365 * 30);
        Trigger::Timer(now.checked_add(lifetime).unwrap_or(far_future).min(far_future))
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Trigger::Timer(_) => "timer",
            Trigger::Scope(_) => "scope",
        }
    }

    /// Whether the trigger would fire immediately.
    pub(crate) fn has_fired(&self) -> bool {
        match self {
            Trigger::Timer(deadline) => Instant::now() >= *deadline,
            Trigger::Scope(scope) => scope.is_cancelled(),
        }
    }

    async fn fired(&self) -> Expiry {
        match self {
            Trigger::Timer(deadline) => {
                tokio::time::sleep_until(*deadline).await;
                Expiry::Elapsed
            }
            Trigger::Scope(scope) => match scope.cancelled().await {
                ScopeError::Cancelled => Expiry::Cancelled,
                ScopeError::DeadlineExceeded => Expiry::DeadlineExceeded,
            },
        }
    }

    /// Frees whatever the trigger holds. A derived scope is cancelled so its
    /// own descendants do not outlive the watcher.
    fn release(self) {
        if let Trigger::Scope(scope) = self {
            scope.cancel();
        }
    }
}

/// Why a watcher fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expiry {
    Elapsed,
    Cancelled,
    DeadlineExceeded,
}

impl fmt::Display for Expiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expiry::Elapsed => write!(f, "lifetime elapsed"),
            Expiry::Cancelled => write!(f, "scope cancelled"),
            Expiry::DeadlineExceeded => write!(f, "scope deadline exceeded"),
        }
    }
}

enum Outcome {
    Stopped,
    Fired(Expiry),
}

/// Removes the watcher's entry when its task is dropped without finishing,
/// as happens to every task when the runtime shuts down.
struct Teardown<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    key: K,
    id: u64,
    shared: Weak<Shared<K, V>>,
    armed: Arc<AtomicBool>,
    done: bool,
}

impl<K, V> Drop for Teardown<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if self.done || !self.armed.load(Ordering::Acquire) {
            return;
        }
        if let Some(shared) = self.shared.upgrade() {
            if shared.expire(&self.key, self.id) {
                warn!(watcher = self.id, "watcher task torn down, entry dropped");
            }
        }
    }
}

/// Background task owning one temporary entry's trigger.
pub(crate) struct ExpiryWatcher<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    trigger: Trigger,
    stop: oneshot::Receiver<()>,
    teardown: Teardown<K, V>,
}

impl<K, V> ExpiryWatcher<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Builds a watcher and the handle that stops it.
    pub(crate) fn new(
        key: K,
        id: u64,
        trigger: Trigger,
        shared: Weak<Shared<K, V>>,
    ) -> (Self, WatcherHandle) {
        let (stop_tx, stop_rx) = oneshot::channel();
        let armed = Arc::new(AtomicBool::new(false));
        let watcher = Self {
            trigger,
            stop: stop_rx,
            teardown: Teardown {
                key,
                id,
                shared,
                armed: Arc::clone(&armed),
                done: false,
            },
        };
        let handle = WatcherHandle {
            id,
            stop: Some(stop_tx),
            armed,
        };
        (watcher, handle)
    }

    /// Races the trigger against the stop signal. Exactly one branch runs.
    pub(crate) async fn run(self) {
        let ExpiryWatcher {
            trigger,
            mut stop,
            mut teardown,
        } = self;

        let outcome = tokio::select! {
            biased;
            // A dropped sender counts as a stop too.
            _ = &mut stop => Outcome::Stopped,
            expiry = trigger.fired() => Outcome::Fired(expiry),
        };
        teardown.done = true;
        let id = teardown.id;

        match outcome {
            Outcome::Stopped => {
                trace!(watcher = id, "watcher stopped");
                trigger.release();
            }
            Outcome::Fired(expiry) => {
                let Some(shared) = teardown.shared.upgrade() else {
                    return;
                };
                if shared.expire(&teardown.key, id) {
                    debug!(watcher = id, cause = %expiry, "entry expired");
                } else {
                    trace!(watcher = id, cause = %expiry, "watcher superseded before expiry");
                }
            }
        }
    }
}
