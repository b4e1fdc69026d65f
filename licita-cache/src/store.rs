//! Expiring key-value store with a tag index.
//!
//! Entries and the tag index live behind one lock so a reader can never see
//! a tag pointing at a key that is gone, or a key whose tags are missing
//! from the index.

use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use licita_log::{debug, trace};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;

/// Upper bound for TTLs that would overflow the clock.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// Point-in-time view of the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Stored entries, including expired ones not yet swept
    pub size: usize,
    /// Number of tags with at least one key
    pub tag_count: usize,
    /// Tags with at least one key, sorted
    pub tags: Vec<String>,
}

pub(crate) struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    tags: HashMap<String, HashSet<String>>,
}

impl<V> Inner<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            tags: HashMap::new(),
        }
    }

    fn put(&mut self, key: String, entry: CacheEntry<V>) {
        // Old tags must not keep pointing at the new value.
        self.remove(&key);
        for tag in &entry.tags {
            self.tags
                .entry(tag.clone())
                .or_default()
                .insert(key.clone());
        }
        self.entries.insert(key, entry);
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        for tag in &entry.tags {
            if let Some(keys) = self.tags.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tags.remove(tag);
                }
            }
        }
        Some(entry)
    }

    fn invalidate_tag(&mut self, tag: &str) -> usize {
        let Some(keys) = self.tags.remove(tag) else {
            return 0;
        };
        keys.iter().filter(|key| self.remove(key).is_some()).count()
    }

    /// Drop the entry under `key` if it has expired. Returns `true` when an
    /// unexpired entry is present afterwards.
    fn touch(&mut self, key: &str, now: Instant) -> bool {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired_at(now),
            None => return false,
        };
        if expired {
            self.remove(key);
        }
        !expired
    }

    pub(crate) fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.tags.clear();
    }
}

/// In-process cache where every entry carries an expiry and a set of tags.
///
/// Cloning is cheap and every clone shares the same storage.
///
/// # Examples
///
/// ```
/// use licita_cache::TaggedCache;
/// use serde_json::json;
/// use std::time::Duration;
///
/// let cache = TaggedCache::new();
/// cache.set("cliente:1", json!({"nome": "ACME"}), Duration::from_secs(60), &["clientes"]);
/// assert!(cache.get("cliente:1").is_some());
///
/// cache.invalidate_by_tag("clientes");
/// assert!(cache.get("cliente:1").is_none());
/// ```
pub struct TaggedCache<V = serde_json::Value> {
    inner: Arc<Mutex<Inner<V>>>,
    config: Arc<CacheConfig>,
}

impl<V> Clone for TaggedCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            config: Arc::clone(&self.config),
        }
    }
}

impl<V> Default for TaggedCache<V> {
    fn default() -> Self {
        Self::with_config(CacheConfig::default())
    }
}

impl<V> std::fmt::Debug for TaggedCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaggedCache")
            .field("size", &self.size())
            .field("config", &self.config)
            .finish()
    }
}

impl<V> TaggedCache<V> {
    /// Create a cache with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::new())),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Store `value` under `key` for `ttl`, replacing any previous entry
    /// and its tag memberships.
    pub fn set(&self, key: &str, value: V, ttl: Duration, tags: &[&str]) {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + FAR_FUTURE);
        self.set_until(key, value, expires_at, tags);
    }

    /// Store `value` with an absolute expiry. An instant already in the
    /// past stores an entry that is never returned.
    pub fn set_until(&self, key: &str, value: V, expires_at: Instant, tags: &[&str]) {
        let key = self.config.build_key(key);
        let tags: HashSet<String> = tags.iter().map(|t| t.to_string()).collect();
        trace!("cache set {} tags={:?}", key, tags);

        self.inner
            .lock()
            .put(key, CacheEntry::new(value, expires_at, tags));
    }

    /// Store `value` with the configured default TTL.
    pub fn insert(&self, key: &str, value: V, tags: &[&str]) {
        self.set(key, value, self.config.default_ttl, tags);
    }

    /// Return the value if present and not expired. An expired entry found
    /// here is removed on the spot.
    pub fn get(&self, key: &str) -> Option<V>
    where
        V: Clone,
    {
        let key = self.config.build_key(key);
        let mut inner = self.inner.lock();
        if inner.touch(&key, Instant::now()) {
            inner.entries.get(&key).map(|entry| entry.value.clone())
        } else {
            None
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        let key = self.config.build_key(key);
        self.inner.lock().touch(&key, Instant::now())
    }

    /// Remaining lifetime of a live entry.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let key = self.config.build_key(key);
        let inner = self.inner.lock();
        inner
            .entries
            .get(&key)
            .and_then(|entry| entry.remaining_at(Instant::now()))
    }

    /// Remove one key. Returns whether an entry was stored under it.
    pub fn delete(&self, key: &str) -> bool {
        let key = self.config.build_key(key);
        let removed = self.inner.lock().remove(&key).is_some();
        if removed {
            trace!("cache delete {}", key);
        }
        removed
    }

    /// Remove every entry carrying `tag`, returning how many were removed.
    pub fn invalidate_by_tag(&self, tag: &str) -> usize {
        let removed = self.inner.lock().invalidate_tag(tag);
        debug!("Invalidated {} cache entries for tag '{}'", removed, tag);
        removed
    }

    /// Remove every entry carrying any of `tags`.
    pub fn invalidate_tags(&self, tags: &[&str]) -> usize {
        let mut inner = self.inner.lock();
        let removed: usize = tags.iter().map(|tag| inner.invalidate_tag(tag)).sum();
        debug!("Invalidated {} cache entries for tags {:?}", removed, tags);
        removed
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
        debug!("Cache cleared");
    }

    /// Remove all expired entries, returning how many were removed.
    pub fn cleanup(&self) -> usize {
        self.inner.lock().purge_expired(Instant::now())
    }

    /// Number of stored entries. Expired entries count until they are
    /// read or swept.
    pub fn size(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let mut tags: Vec<String> = inner.tags.keys().cloned().collect();
        tags.sort();
        CacheStats {
            size: inner.entries.len(),
            tag_count: tags.len(),
            tags,
        }
    }

    /// Keys currently indexed under `tag`, sorted and without the prefix.
    pub fn keys_for_tag(&self, tag: &str) -> Vec<String> {
        let inner = self.inner.lock();
        let mut keys: Vec<String> = inner
            .tags
            .get(tag)
            .map(|keys| {
                keys.iter()
                    .map(|k| self.config.strip_key(k).to_string())
                    .collect()
            })
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Tags of the entry stored under `key`, sorted.
    pub fn tags_for_key(&self, key: &str) -> Vec<String> {
        let key = self.config.build_key(key);
        let inner = self.inner.lock();
        let mut tags: Vec<String> = inner
            .entries
            .get(&key)
            .map(|entry| entry.tags.iter().cloned().collect())
            .unwrap_or_default();
        tags.sort();
        tags
    }

    pub fn list_tags(&self) -> Vec<String> {
        self.stats().tags
    }

    pub(crate) fn downgrade(&self) -> Weak<Mutex<Inner<V>>> {
        Arc::downgrade(&self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_overwrite_replaces_tags() {
        let cache = TaggedCache::new();
        cache.set("k", json!(1), Duration::from_secs(60), &["a", "b"]);
        cache.set("k", json!(2), Duration::from_secs(60), &["c"]);

        assert_eq!(cache.get("k"), Some(json!(2)));
        assert_eq!(cache.tags_for_key("k"), vec!["c"]);
        assert_eq!(cache.list_tags(), vec!["c"]);
        assert_eq!(cache.invalidate_by_tag("a"), 0);
        assert_eq!(cache.get("k"), Some(json!(2)));
    }

    #[test]
    fn test_delete_cleans_index() {
        let cache = TaggedCache::new();
        cache.set("k", json!(1), Duration::from_secs(60), &["t"]);
        assert!(cache.delete("k"));
        assert!(!cache.delete("k"));
        assert!(cache.keys_for_tag("t").is_empty());
        assert!(cache.list_tags().is_empty());
    }

    #[test]
    fn test_duplicate_tags_collapse() {
        let cache: TaggedCache<u32> = TaggedCache::new();
        cache.set("k", 1, Duration::from_secs(60), &["t", "t"]);
        assert_eq!(cache.tags_for_key("k"), vec!["t"]);
        assert_eq!(cache.invalidate_by_tag("t"), 1);
    }

    #[test]
    fn test_prefixed_keys() {
        let cache = TaggedCache::with_config(CacheConfig::new().with_key_prefix("crm"));
        cache.set("db:clientes:1", json!(1), Duration::from_secs(60), &["clientes"]);

        assert_eq!(cache.get("db:clientes:1"), Some(json!(1)));
        assert_eq!(cache.keys_for_tag("clientes"), vec!["db:clientes:1"]);
        assert_eq!(cache.tags_for_key("db:clientes:1"), vec!["clientes"]);
    }

    #[test]
    fn test_huge_ttl_does_not_overflow() {
        let cache = TaggedCache::new();
        cache.set("k", json!(true), Duration::MAX, &[]);
        assert_eq!(cache.get("k"), Some(json!(true)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_reports_remaining() {
        let cache = TaggedCache::new();
        cache.set("k", json!(1), Duration::from_secs(10), &[]);
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(cache.ttl("k"), Some(Duration::from_secs(6)));
        tokio::time::advance(Duration::from_secs(7)).await;
        assert_eq!(cache.ttl("k"), None);
    }
}
