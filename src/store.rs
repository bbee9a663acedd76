use std::hash::Hash;

use dashmap::DashMap;

/// Concurrent key-value storage backing both map variants.
pub(crate) struct KeyedStore<K, V> {
    map: DashMap<K, V>,
}

impl<K, V> KeyedStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            map: DashMap::new(),
        }
    }

    pub(crate) fn load(&self, key: &K) -> Option<V> {
        self.map.get(key).map(|v| v.value().clone())
    }

    pub(crate) fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    pub(crate) fn store_raw(&self, key: K, value: V) {
        self.map.insert(key, value);
    }

    pub(crate) fn delete_raw(&self, key: &K) {
        self.map.remove(key);
    }

    /// Visits entries until `visitor` returns `false`.
    ///
    /// Works on a snapshot taken before the first call, so the visitor may
    /// freely store or delete. Entries changed during the scan may or may not
    /// be observed.
    pub(crate) fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        let snapshot: Vec<(K, V)> = self
            .map
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        for (key, value) in &snapshot {
            if !visitor(key, value) {
                break;
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_load_delete() {
        let store = KeyedStore::new();
        assert_eq!(store.load(&"k"), None);

        store.store_raw("k", 1);
        store.store_raw("k", 2);
        assert_eq!(store.load(&"k"), Some(2));
        assert_eq!(store.len(), 1);

        store.delete_raw(&"k");
        assert!(!store.contains_key(&"k"));
        store.delete_raw(&"k");
    }

    #[test]
    fn test_for_each_halts_early() {
        let store = KeyedStore::new();
        for i in 0..10 {
            store.store_raw(i, i * 2);
        }

        let mut seen = 0;
        store.for_each(|_, _| {
            seen += 1;
            seen < 3
        });
        assert_eq!(seen, 3);
    }

    #[test]
    fn test_for_each_tolerates_mutation() {
        let store = KeyedStore::new();
        store.store_raw("a", 1);
        store.store_raw("b", 2);

        store.for_each(|k, _| {
            store.delete_raw(k);
            store.store_raw("c", 3);
            true
        });
        assert_eq!(store.load(&"a"), None);
        assert_eq!(store.load(&"b"), None);
        assert_eq!(store.load(&"c"), Some(3));
    }
}
