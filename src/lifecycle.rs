//! Watcher lifecycle shared by both map variants.
//!
//! Every protocol step that touches a key runs while holding that key's
//! [`WatcherTable`] slot. The slot lock is always taken before any
//! [`KeyedStore`] shard lock, and it is what serializes Store, Delete and
//! expiry for one key:
//!
//! - a replacing store stops the previous watcher and installs the next one
//!   before releasing the slot, so a watcher is recorded before it can fire;
//! - an expiring watcher deletes only while the slot still holds its own id,
//!   so a superseded watcher can never remove a fresher value.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use tokio::runtime::Handle;
use tracing::{debug, trace, warn};

use crate::error::TMapError;
use crate::store::KeyedStore;
use crate::watcher::{ExpiryWatcher, Trigger, WatcherHandle, WatcherTable};

pub(crate) struct Shared<K, V> {
    store: KeyedStore<K, V>,
    watchers: WatcherTable<K>,
    next_id: AtomicU64,
    runtime: Handle,
}

impl<K, V> Shared<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn try_new() -> Result<Arc<Self>, TMapError> {
        let runtime = Handle::try_current()?;
        Ok(Arc::new(Self {
            store: KeyedStore::new(),
            watchers: WatcherTable::new(),
            next_id: AtomicU64::new(1),
            runtime,
        }))
    }

    pub(crate) fn load(&self, key: &K) -> Option<V> {
        self.store.load(key)
    }

    pub(crate) fn contains_key(&self, key: &K) -> bool {
        self.store.contains_key(key)
    }

    pub(crate) fn for_each<F>(&self, visitor: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.store.for_each(visitor)
    }

    pub(crate) fn len(&self) -> usize {
        self.store.len()
    }

    pub(crate) fn watchers(&self) -> usize {
        self.watchers.count()
    }

    pub(crate) fn has_watcher(&self, key: &K) -> bool {
        self.watchers.get(key).is_some()
    }

    #[cfg(test)]
    pub(crate) fn watcher_id(&self, key: &K) -> Option<u64> {
        self.watchers.get(key)
    }

    /// Stores `value` under `key`, superseding any live watcher.
    ///
    /// With no trigger the entry is persistent. A trigger that has already
    /// fired, or one no runtime is left to watch, removes the key instead of
    /// writing it.
    pub(crate) fn install(self: &Arc<Self>, key: K, value: V, trigger: Option<Trigger>) {
        let mut slot = self.watchers.slot(key.clone());

        if let Entry::Occupied(live) = &mut slot {
            live.get_mut().stop();
        }

        let trigger = match trigger {
            Some(trigger) if trigger.has_fired() => {
                trace!("trigger already fired, dropping entry");
                self.drop_entry(&key, slot);
                return;
            }
            other => other,
        };

        let Some(trigger) = trigger else {
            self.store.store_raw(key, value);
            if let Entry::Occupied(live) = slot {
                live.remove();
            }
            return;
        };

        let Some(handle) = self.spawn(key.clone(), trigger) else {
            self.drop_entry(&key, slot);
            return;
        };

        self.store.store_raw(key, value);
        match slot {
            Entry::Occupied(mut live) => {
                live.insert(handle);
            }
            Entry::Vacant(free) => {
                free.insert(handle);
            }
        }
    }

    /// Removes `key` and its watcher record while the slot is still held.
    fn drop_entry(&self, key: &K, slot: Entry<'_, K, WatcherHandle>) {
        self.store.delete_raw(key);
        if let Entry::Occupied(live) = slot {
            live.remove();
        }
    }

    /// Deletes `key` and stops its watcher. Both are gone when this returns.
    pub(crate) fn remove(&self, key: &K) {
        match self.watchers.slot(key.clone()) {
            Entry::Occupied(mut live) => {
                live.get_mut().stop();
                self.store.delete_raw(key);
                let handle = live.remove();
                trace!(watcher = handle.id(), "watcher stopped by delete");
            }
            Entry::Vacant(_locked) => {
                self.store.delete_raw(key);
            }
        }
    }

    /// Expiry path of watcher `id`. Returns whether it still owned `key`.
    pub(crate) fn expire(&self, key: &K, id: u64) -> bool {
        match self.watchers.slot(key.clone()) {
            Entry::Occupied(live) if live.get().id() == id => {
                self.store.delete_raw(key);
                live.remove();
                true
            }
            _ => false,
        }
    }

    /// Spawns a watcher. Called with the key's slot held, so the watcher
    /// cannot reach [`expire`](Self::expire) before its handle is recorded.
    ///
    /// Returns `None` if the runtime is shut down and discarded the task.
    fn spawn(self: &Arc<Self>, key: K, trigger: Trigger) -> Option<WatcherHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let kind = trigger.kind();
        let (watcher, handle) = ExpiryWatcher::new(key, id, trigger, Arc::downgrade(self));
        let task = self.runtime.spawn(watcher.run());

        // A live task cannot finish while the slot is held: expiring needs
        // the slot and stopping needs a signal. A finished task was rejected.
        handle.arm();
        if task.is_finished() {
            warn!(watcher = id, "runtime is shut down, temporary entry not stored");
            return None;
        }

        debug!(watcher = id, trigger = kind, "watcher installed");
        Some(handle)
    }
}
