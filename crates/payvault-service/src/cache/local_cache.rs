//! Time-bounded in-memory cache.

use chrono::Duration;
use parking_lot::Mutex;
use payvault_core::{CacheEntry, Clock, PaymentResult, PersistentStore, SystemClock};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default TTL for cached items (24 hours).
pub const DEFAULT_TTL: Duration = Duration::hours(24);

/// Cache statistics for monitoring.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of fresh reads.
    pub hits: u64,
    /// Number of reads that found nothing fresh.
    pub misses: u64,
    /// Number of entries dropped for being stale.
    pub evictions: u64,
    /// Number of entries written.
    pub writes: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry<String>>,
    stats: CacheStats,
    /// Bumped by every `clear()`. Work started under an older generation
    /// must not land in memory or in the store.
    generation: u64,
}

enum Lookup {
    Fresh(String),
    Stale,
    Absent,
}

/// Local cache for payment records and history pages.
///
/// Values are stored type-erased as JSON. An entry is fresh iff
/// `now - fetched_at < ttl`; stale entries are evicted when read. The lock is
/// never held across an await. Reads and writes that straddle a `clear()`
/// are discarded, so nothing from before the clear survives it.
pub struct LocalCache {
    state: Mutex<CacheState>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    store: Option<Arc<dyn PersistentStore>>,
}

impl LocalCache {
    /// Creates an in-memory cache with the default TTL and the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(DEFAULT_TTL, Arc::new(SystemClock))
    }

    /// Creates an in-memory cache with a custom TTL and clock.
    #[must_use]
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            ttl,
            clock,
            store: None,
        }
    }

    /// Mirrors every write to `store` and falls back to it on memory misses.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn PersistentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// The freshness window.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lookup_memory(&self, key: &str) -> Lookup {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let fresh = match state.entries.get(key) {
            Some(entry) if entry.is_fresh(now, self.ttl) => Some(entry.value.clone()),
            Some(_) => None,
            None => return Lookup::Absent,
        };

        match fresh {
            Some(json) => Lookup::Fresh(json),
            None => {
                state.entries.remove(key);
                state.stats.evictions += 1;
                Lookup::Stale
            }
        }
    }

    async fn lookup_store(&self, key: &str, generation: u64) -> Option<String> {
        let store = self.store.as_ref()?;

        let entry = match store.load_entry(key).await {
            Ok(entry) => entry?,
            Err(e) => {
                warn!("Persistent cache read failed for key '{}': {}", key, e);
                return None;
            }
        };

        if !entry.is_fresh(self.clock.now(), self.ttl) {
            self.state.lock().stats.evictions += 1;
            if let Err(e) = store.delete_entry(key).await {
                warn!("Failed to evict stale persisted key '{}': {}", key, e);
            }
            return None;
        }

        let mut state = self.state.lock();
        if state.generation != generation {
            debug!("Dropping load of '{}' that raced a clear", key);
            return None;
        }
        let json = entry.value.clone();
        state.entries.insert(key.to_string(), entry);
        Some(json)
    }

    /// Get a typed value if a fresh entry exists.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> PaymentResult<Option<T>> {
        let generation = self.generation();
        let json = match self.lookup_memory(key) {
            Lookup::Fresh(json) => Some(json),
            Lookup::Stale | Lookup::Absent => self.lookup_store(key, generation).await,
        };

        match json {
            Some(json) => {
                self.state.lock().stats.hits += 1;
                debug!("Cache hit for key '{}'", key);
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => {
                self.state.lock().stats.misses += 1;
                debug!("Cache miss for key '{}'", key);
                Ok(None)
            }
        }
    }

    /// Set a typed value, stamped with the current time.
    ///
    /// The in-memory write always lands; an error means only the persistent
    /// mirror failed.
    pub async fn put<T: Serialize>(&self, key: &str, value: &T) -> PaymentResult<()> {
        self.put_if_current(self.generation(), key, value).await?;
        Ok(())
    }

    /// The current clear generation. Pass it to [`Self::put_if_current`]
    /// when the value was obtained by work that started earlier.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Like [`Self::put`], but skipped when the cache was cleared after
    /// `generation` was read. Returns `false` when the write was skipped.
    pub async fn put_if_current<T: Serialize>(
        &self,
        generation: u64,
        key: &str,
        value: &T,
    ) -> PaymentResult<bool> {
        let entry = CacheEntry::new(serde_json::to_string(value)?, self.clock.now());

        {
            let mut state = self.state.lock();
            if state.generation != generation {
                debug!("Skipping write of '{}' from before a clear", key);
                return Ok(false);
            }
            state.entries.insert(key.to_string(), entry.clone());
            state.stats.writes += 1;
        }
        debug!("Cached key '{}'", key);

        if let Some(store) = &self.store {
            store.save_entry(key, &entry).await?;

            // A clear that bumped the generation before this check may have
            // run `delete_all` before the save landed; undo the save. A later
            // clear deletes it itself.
            if self.generation() != generation {
                debug!("Write of '{}' raced a clear; removing persisted copy", key);
                store.delete_entry(key).await?;
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Delete a value from the cache.
    ///
    /// Returns `true` if the key was held in memory.
    pub async fn invalidate(&self, key: &str) -> PaymentResult<bool> {
        let removed = self.state.lock().entries.remove(key).is_some();
        if let Some(store) = &self.store {
            store.delete_entry(key).await?;
        }
        debug!("Invalidated key '{}': {}", key, removed);
        Ok(removed)
    }

    /// Remove every entry, including the persisted copy.
    pub async fn clear(&self) -> PaymentResult<()> {
        let count = {
            let mut state = self.state.lock();
            let count = state.entries.len();
            state.entries.clear();
            state.generation += 1;
            count
        };

        if let Some(store) = &self.store {
            store.delete_all().await?;
        }
        debug!("Cleared {} cached entries", count);
        Ok(())
    }

    /// Get current cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats.clone()
    }

    /// Get the current number of in-memory entries, stale ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Raw JSON of every in-memory entry.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.state
            .lock()
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect()
    }
}

impl Default for LocalCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LocalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.len())
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use payvault_core::{ManualClock, PaymentError};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        name: String,
    }

    fn record(name: &str) -> Record {
        Record {
            name: name.to_string(),
        }
    }

    fn cache_at_t0() -> (LocalCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        ));
        (LocalCache::with_clock(DEFAULT_TTL, clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let (cache, _) = cache_at_t0();
        cache.put("k", &record("a")).await.unwrap();

        let value: Option<Record> = cache.get("k").await.unwrap();
        assert_eq!(value, Some(record("a")));
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_freshness_boundary() {
        let (cache, clock) = cache_at_t0();
        cache.put("k", &record("a")).await.unwrap();

        clock.advance(Duration::minutes(23 * 60 + 59));
        assert!(cache.get::<Record>("k").await.unwrap().is_some());

        clock.advance(Duration::minutes(2));
        assert!(cache.get::<Record>("k").await.unwrap().is_none());

        let stats = cache.stats();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.misses, 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_exactly_ttl_is_stale() {
        let (cache, clock) = cache_at_t0();
        cache.put("k", &record("a")).await.unwrap();
        clock.advance(DEFAULT_TTL);
        assert!(cache.get::<Record>("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overwrite_refreshes_timestamp() {
        let (cache, clock) = cache_at_t0();
        cache.put("k", &record("a")).await.unwrap();
        clock.advance(Duration::hours(20));
        cache.put("k", &record("b")).await.unwrap();
        clock.advance(Duration::hours(20));

        assert_eq!(cache.get::<Record>("k").await.unwrap(), Some(record("b")));
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let (cache, _) = cache_at_t0();
        cache.put("a", &record("a")).await.unwrap();
        cache.put("b", &record("b")).await.unwrap();

        assert!(cache.invalidate("a").await.unwrap());
        assert!(!cache.invalidate("a").await.unwrap());
        assert_eq!(cache.len(), 1);

        cache.clear().await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_type_mismatch_is_cache_error() {
        let (cache, _) = cache_at_t0();
        cache.put("k", &42u32).await.unwrap();
        let err = cache.get::<Record>("k").await.unwrap_err();
        assert!(matches!(err, PaymentError::Cache(_)));
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..CacheStats::default()
        };
        assert!((stats.hit_rate() - 75.0).abs() < f64::EPSILON);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    // ============ Persistence ============

    #[derive(Default)]
    struct MemoryStore {
        entries: std::sync::Mutex<HashMap<String, CacheEntry<String>>>,
        fail_writes: bool,
    }

    #[async_trait]
    impl PersistentStore for MemoryStore {
        async fn load_entry(&self, key: &str) -> PaymentResult<Option<CacheEntry<String>>> {
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        async fn save_entry(&self, key: &str, entry: &CacheEntry<String>) -> PaymentResult<()> {
            if self.fail_writes {
                return Err(PaymentError::Cache("disk full".to_string()));
            }
            self.entries.lock().unwrap().insert(key.to_string(), entry.clone());
            Ok(())
        }

        async fn delete_entry(&self, key: &str) -> PaymentResult<()> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }

        async fn delete_all(&self) -> PaymentResult<()> {
            self.entries.lock().unwrap().clear();
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_store_warms_a_fresh_cache() {
        let store = Arc::new(MemoryStore::default());
        let clock = Arc::new(ManualClock::new(Utc::now()));

        let first = LocalCache::with_clock(DEFAULT_TTL, clock.clone()).with_store(store.clone());
        first.put("k", &record("persisted")).await.unwrap();

        let second = LocalCache::with_clock(DEFAULT_TTL, clock.clone()).with_store(store.clone());
        assert_eq!(second.get::<Record>("k").await.unwrap(), Some(record("persisted")));
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_persisted_entry_is_evicted() {
        let store = Arc::new(MemoryStore::default());
        let clock = Arc::new(ManualClock::new(Utc::now()));

        let cache = LocalCache::with_clock(DEFAULT_TTL, clock.clone()).with_store(store.clone());
        cache.put("k", &record("old")).await.unwrap();
        clock.advance(Duration::hours(25));

        assert!(cache.get::<Record>("k").await.unwrap().is_none());
        assert!(store.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_wipes_store() {
        let store = Arc::new(MemoryStore::default());
        let cache = LocalCache::new().with_store(store.clone());
        cache.put("a", &record("a")).await.unwrap();

        cache.clear().await.unwrap();
        assert!(store.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_keeps_memory_copy() {
        let store = Arc::new(MemoryStore {
            fail_writes: true,
            ..MemoryStore::default()
        });
        let cache = LocalCache::new().with_store(store);

        assert!(cache.put("k", &record("a")).await.is_err());
        assert_eq!(cache.get::<Record>("k").await.unwrap(), Some(record("a")));
    }

    // ============ Clear races ============

    /// Store that parks loads or saves until released.
    #[derive(Default)]
    struct GatedStore {
        inner: MemoryStore,
        gate_loads: bool,
        gate_saves: bool,
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    impl GatedStore {
        async fn pause(&self) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }

    #[async_trait]
    impl PersistentStore for GatedStore {
        async fn load_entry(&self, key: &str) -> PaymentResult<Option<CacheEntry<String>>> {
            let snapshot = self.inner.load_entry(key).await?;
            if self.gate_loads {
                self.pause().await;
            }
            Ok(snapshot)
        }

        async fn save_entry(&self, key: &str, entry: &CacheEntry<String>) -> PaymentResult<()> {
            if self.gate_saves {
                self.pause().await;
            }
            self.inner.save_entry(key, entry).await
        }

        async fn delete_entry(&self, key: &str) -> PaymentResult<()> {
            self.inner.delete_entry(key).await
        }

        async fn delete_all(&self) -> PaymentResult<()> {
            self.inner.delete_all().await
        }
    }

    #[tokio::test]
    async fn test_load_racing_clear_is_discarded() {
        let store = Arc::new(GatedStore {
            gate_loads: true,
            ..GatedStore::default()
        });
        store.inner.entries.lock().unwrap().insert(
            "k".to_string(),
            CacheEntry::new(serde_json::to_string(&record("secret")).unwrap(), Utc::now()),
        );
        let cache = Arc::new(LocalCache::new().with_store(store.clone()));

        let reader = tokio::spawn({
            let cache = cache.clone();
            async move { cache.get::<Record>("k").await }
        });
        store.entered.notified().await;

        cache.clear().await.unwrap();
        store.release.notify_one();

        assert_eq!(reader.await.unwrap().unwrap(), None);
        assert!(cache.is_empty());
        assert!(store.inner.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_racing_clear_is_removed() {
        let store = Arc::new(GatedStore {
            gate_saves: true,
            ..GatedStore::default()
        });
        let cache = Arc::new(LocalCache::new().with_store(store.clone()));

        let writer = tokio::spawn({
            let cache = cache.clone();
            async move { cache.put("k", &record("secret")).await }
        });
        store.entered.notified().await;

        cache.clear().await.unwrap();
        store.release.notify_one();

        writer.await.unwrap().unwrap();
        assert!(cache.is_empty());
        assert!(store.inner.entries.lock().unwrap().is_empty());
        assert_eq!(cache.get::<Record>("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_from_older_generation_is_skipped() {
        let (cache, _) = cache_at_t0();
        let generation = cache.generation();
        cache.clear().await.unwrap();

        assert!(!cache.put_if_current(generation, "k", &record("a")).await.unwrap());
        assert!(cache.is_empty());

        let current = cache.generation();
        assert!(cache.put_if_current(current, "k", &record("b")).await.unwrap());
        assert_eq!(cache.get::<Record>("k").await.unwrap(), Some(record("b")));
    }
}
