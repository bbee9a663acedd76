use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::config::TMapConfig;
use crate::error::{LifetimeError, TMapError};
use crate::lifecycle::Shared;
use crate::lifetime;
use crate::watcher::Trigger;

/// A thread-safe, timed key-value store that allows expiration of keys.
///
/// A default lifetime can be set at construction, and each store may supply
/// its own. When a lifetime elapses the entry removes itself; no sweeper runs.
///
/// Every temporary entry owns one spawned Tokio task until it expires, is
/// replaced or is deleted. Avoid holding very large numbers of temporary
/// entries at once.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use tmap::TMap;
///
/// #[tokio::main]
/// async fn main() {
///     let map = TMap::new(Duration::ZERO);
///
///     map.store("session", "token");
///     map.store_for("otp", "123456", Duration::from_secs(30));
///
///     assert_eq!(map.load(&"otp"), Some("123456"));
/// }
/// ```
pub struct TMap<K, V> {
    shared: Arc<Shared<K, V>>,
    default_lifetime: Duration,
}

impl<K, V> Clone for TMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            default_lifetime: self.default_lifetime,
        }
    }
}

impl<K, V> TMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a map whose entries live for `default_lifetime` unless a store
    /// says otherwise. Zero keeps entries until they are deleted.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context.
    pub fn new(default_lifetime: Duration) -> Self {
        Self::with_config(TMapConfig::default().with_default_lifetime(default_lifetime))
    }

    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context. Use
    /// [`try_with_config`](Self::try_with_config) to get an error instead.
    pub fn with_config(config: TMapConfig) -> Self {
        match Self::try_with_config(config) {
            Ok(map) => map,
            Err(e) => panic!(
                "{e}. Create the map from within a #[tokio::main] or #[tokio::test] \
                 context, or from code running on a Tokio runtime."
            ),
        }
    }

    pub fn try_with_config(config: TMapConfig) -> Result<Self, TMapError> {
        Ok(Self {
            shared: Shared::try_new()?,
            default_lifetime: config.default_lifetime,
        })
    }

    pub fn load(&self, key: &K) -> Option<V> {
        self.shared.load(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.shared.contains_key(key)
    }

    /// Stores `value` with the default lifetime.
    pub fn store(&self, key: K, value: V) {
        self.install(key, value, self.default_lifetime);
    }

    /// Stores `value` for `lifetime`. A zero lifetime falls back to the
    /// default one.
    pub fn store_for(&self, key: K, value: V, lifetime: Duration) {
        let lifetime = if lifetime.is_zero() {
            self.default_lifetime
        } else {
            lifetime
        };
        self.install(key, value, lifetime);
    }

    /// Stores `value` for the sum of `lifetimes`, or the default lifetime if
    /// they sum to zero.
    ///
    /// # Errors
    ///
    /// Returns `LifetimeError::Overflow` if the sum does not fit in a
    /// `Duration`. Nothing is stored in that case.
    pub fn store_with<I>(&self, key: K, value: V, lifetimes: I) -> Result<(), LifetimeError>
    where
        I: IntoIterator<Item = Duration>,
    {
        let lifetime = lifetime::resolve(lifetimes, self.default_lifetime)?;
        self.install(key, value, lifetime.unwrap_or(Duration::ZERO));
        Ok(())
    }

    /// Stores `value` for a signed number of milliseconds, as lifetimes read
    /// from configuration or the wire usually arrive. Zero falls back to the
    /// default lifetime.
    ///
    /// # Errors
    ///
    /// Returns `LifetimeError::Negative` for a negative lifetime. Nothing is
    /// stored and any existing entry for `key` is left untouched.
    pub fn store_for_millis(
        &self,
        key: K,
        value: V,
        lifetime_ms: i64,
    ) -> Result<(), LifetimeError> {
        let lifetime = lifetime::from_millis(lifetime_ms)?;
        self.store_for(key, value, lifetime);
        Ok(())
    }

    fn install(&self, key: K, value: V, lifetime: Duration) {
        let trigger = (!lifetime.is_zero()).then(|| Trigger::after(lifetime));
        self.shared.install(key, value, trigger);
    }

    /// Deletes the entry for `key` and stops its watcher. A no-op for absent
    /// keys.
    pub fn delete(&self, key: &K) {
        self.shared.remove(key);
    }

    /// Calls `f` for each entry until it returns `false`.
    ///
    /// The visitor may store or delete; entries changed during the scan may
    /// or may not be visited.
    pub fn range<F>(&self, f: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.shared.for_each(f)
    }

    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live expiry watchers.
    pub fn watchers(&self) -> usize {
        self.shared.watchers()
    }

    /// Whether `key` currently has a live expiry watcher.
    pub fn has_watcher(&self, key: &K) -> bool {
        self.shared.has_watcher(key)
    }

    pub fn default_lifetime(&self) -> Duration {
        self.default_lifetime
    }
}
