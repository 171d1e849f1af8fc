use std::collections::HashMap;

use tokio::sync::RwLock;

/// Thread-safe string-keyed store.
///
/// Both caches in the service are instances of this type: the transient
/// job-status store (`Cache<JobResult>`) and the long-lived payload-result
/// store (`Cache<Vec<u8>>`). Typing the value per use site means a lookup can
/// never hand back the wrong shape of data.
///
/// Readers run concurrently; writers are exclusive. Entries live until
/// explicitly deleted — there is no TTL and no eviction.
#[derive(Debug)]
pub struct Cache<V> {
    entries: RwLock<HashMap<String, V>>,
}

impl<V> Default for Cache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Cache<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or unconditionally overwrite the entry for `key`.
    pub async fn put(&self, key: impl Into<String>, value: V) {
        self.entries.write().await.insert(key.into(), value);
    }

    /// Remove the entry for `key`. No-op if the key is absent.
    pub async fn delete(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    /// Returns the current number of entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Returns true if an entry exists for `key`.
    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }
}

impl<V: Clone> Cache<V> {
    /// Look up the entry for `key`. Absence is signaled by `None`, never an
    /// error.
    pub async fn get(&self, key: &str) -> Option<V> {
        self.entries.read().await.get(key).cloned()
    }
}
