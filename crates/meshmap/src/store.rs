//! Node-local key/value store.

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::hash::Hash;
use std::sync::Arc;

/// Requirements on map keys: hashable onto the ring and marshallable.
pub trait MapKey: Serialize + DeserializeOwned + Hash + Eq + Clone + Send + Sync + 'static {}

impl<T> MapKey for T where T: Serialize + DeserializeOwned + Hash + Eq + Clone + Send + Sync + 'static {}

/// Requirements on map values: comparable and marshallable.
pub trait MapValue: Serialize + DeserializeOwned + PartialEq + Clone + Send + Sync + 'static {}

impl<T> MapValue for T where T: Serialize + DeserializeOwned + PartialEq + Clone + Send + Sync + 'static {}

/// Entries held by this node.
///
/// Shared between the map engine (local calls) and the dispatcher (peer
/// calls); clones point at the same map.
#[derive(Debug)]
pub struct LocalStore<K: Eq + Hash, V> {
    entries: Arc<DashMap<K, V>>,
}

impl<K: Eq + Hash, V> Clone for LocalStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<K: Eq + Hash, V> Default for LocalStore<K, V> {
    fn default() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }
}

impl<K: MapKey, V: MapValue> LocalStore<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn contains_value(&self, value: &V) -> bool {
        self.entries.iter().any(|entry| entry.value() == value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> Vec<K> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn entries(&self) -> Vec<(K, V)> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        let store: LocalStore<String, String> = LocalStore::new();
        assert!(store.is_empty());

        assert_eq!(store.insert("k".into(), "v1".into()), None);
        assert_eq!(store.insert("k".into(), "v2".into()), Some("v1".to_string()));
        assert_eq!(store.get(&"k".to_string()), Some("v2".to_string()));
        assert!(store.contains_key(&"k".to_string()));
        assert!(store.contains_value(&"v2".to_string()));
        assert!(!store.contains_value(&"v1".to_string()));
        assert_eq!(store.len(), 1);

        assert_eq!(store.remove(&"k".to_string()), Some("v2".to_string()));
        assert_eq!(store.remove(&"k".to_string()), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_clones_share_entries() {
        let store: LocalStore<u32, u32> = LocalStore::new();
        let shared = store.clone();
        store.insert(1, 10);
        store.insert(2, 20);
        assert_eq!(shared.len(), 2);

        let mut entries = shared.entries();
        entries.sort();
        assert_eq!(entries, vec![(1, 10), (2, 20)]);

        shared.clear();
        assert!(store.keys().is_empty());
    }

    #[test]
    fn test_concurrent_writers() {
        let store: LocalStore<u32, u32> = LocalStore::new();
        let handles: Vec<_> = (0..4u32)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        store.insert(t * 1000 + i, i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 1000);
    }
}
