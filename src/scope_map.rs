use std::hash::Hash;
use std::sync::Arc;

use crate::error::TMapError;
use crate::lifecycle::Shared;
use crate::scope::Scope;
use crate::watcher::Trigger;

/// A thread-safe key-value store whose entries live as long as a [`Scope`].
///
/// Each store derives a child of the supplied scope. The entry is removed
/// once that scope is cancelled or its deadline passes. Storing the same key
/// again, or deleting it, detaches the entry from its previous scope.
///
/// Like [`TMap`](crate::TMap), each live entry owns one spawned Tokio task.
///
/// # Example
///
/// ```rust,no_run
/// use tmap::{Scope, ScopeMap};
///
/// #[tokio::main]
/// async fn main() {
///     let map = ScopeMap::new();
///     let request = Scope::new();
///
///     map.store(&request, "user", 42);
///     assert_eq!(map.load(&"user"), Some(42));
///
///     request.cancel();
/// }
/// ```
pub struct ScopeMap<K, V> {
    shared: Arc<Shared<K, V>>,
}

impl<K, V> Clone for ScopeMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K, V> ScopeMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context. Use
    /// [`try_new`](Self::try_new) to get an error instead.
    pub fn new() -> Self {
        match Self::try_new() {
            Ok(map) => map,
            Err(e) => panic!(
                "{e}. Create the map from within a #[tokio::main] or #[tokio::test] \
                 context, or from code running on a Tokio runtime."
            ),
        }
    }

    pub fn try_new() -> Result<Self, TMapError> {
        Ok(Self {
            shared: Shared::try_new()?,
        })
    }

    pub fn load(&self, key: &K) -> Option<V> {
        self.shared.load(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.shared.contains_key(key)
    }

    /// Stores `value` until `parent` ends.
    ///
    /// If `parent` has already ended the key is removed and nothing is
    /// stored.
    pub fn store(&self, parent: &Scope, key: K, value: V) {
        self.shared
            .install(key, value, Some(Trigger::Scope(parent.child())));
    }

    /// Deletes the entry for `key` and detaches it from its scope. The entry
    /// is gone when this returns.
    pub fn delete(&self, key: &K) {
        self.shared.remove(key);
    }

    /// Calls `f` for each entry until it returns `false`.
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
}

impl<K, V> Default for ScopeMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
