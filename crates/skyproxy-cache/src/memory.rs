//! Process-local cache store.
//!
//! Same contract as the Redis store, with expiry measured on the tokio clock
//! so tests can drive it with `tokio::time::pause`/`advance`.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{CacheError, CacheResult};
use crate::key::CacheKey;
use crate::store::CacheStore;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries that are still readable.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store an entry, dropping any expired ones first so keys that are
    /// never read again don't accumulate.
    fn insert(&self, key: &CacheKey, value: &str, expires_at: Option<Instant>) {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| entry.is_live(now));
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &CacheKey) -> CacheResult<String> {
        let rendered = key.to_string();
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let expired = matches!(entries.get(&rendered), Some(entry) if !entry.is_live(now));
        if expired {
            entries.remove(&rendered);
            return Err(CacheError::NotFound(rendered));
        }

        match entries.get(&rendered) {
            Some(entry) if !entry.value.is_empty() => Ok(entry.value.clone()),
            _ => Err(CacheError::NotFound(rendered)),
        }
    }

    async fn set(&self, key: &CacheKey, value: &str) -> CacheResult<()> {
        self.insert(key, value, None);
        Ok(())
    }

    async fn set_with_expiry(
        &self,
        key: &CacheKey,
        value: &str,
        ttl_seconds: u64,
    ) -> CacheResult<()> {
        // A TTL too large for the clock means the entry never expires
        let expires_at = Instant::now().checked_add(Duration::from_secs(ttl_seconds));
        self.insert(key, value, expires_at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn key(id: &str) -> CacheKey {
        CacheKey::new("weather", id)
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let store = MemoryCacheStore::new();
        let err = store.get(&key("nowhere")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryCacheStore::new();
        store.set(&key("london"), "payload").await.unwrap();
        assert_eq!(store.get(&key("London")).await.unwrap(), "payload");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_value_reads_as_absent() {
        let store = MemoryCacheStore::new();
        store.set(&key("london"), "").await.unwrap();
        assert!(store.get(&key("london")).await.unwrap_err().is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let store = MemoryCacheStore::new();
        store
            .set_with_expiry(&key("london"), "payload", 60)
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(store.get(&key("london")).await.unwrap(), "payload");

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.get(&key("london")).await.unwrap_err().is_not_found());
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_resets_ttl() {
        let store = MemoryCacheStore::new();
        store.set_with_expiry(&key("rome"), "old", 10).await.unwrap();

        tokio::time::advance(Duration::from_secs(8)).await;
        store.set_with_expiry(&key("rome"), "new", 10).await.unwrap();

        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(store.get(&key("rome")).await.unwrap(), "new");
    }

    #[tokio::test(start_paused = true)]
    async fn test_plain_set_never_expires() {
        let store = MemoryCacheStore::new();
        store.set(&key("lima"), "forever").await.unwrap();

        tokio::time::advance(Duration::from_secs(365 * 24 * 3600)).await;
        assert_eq!(store.get(&key("lima")).await.unwrap(), "forever");
    }

    #[tokio::test]
    async fn test_zero_ttl_is_immediately_unreadable() {
        let store = MemoryCacheStore::new();
        store.set_with_expiry(&key("quito"), "gone", 0).await.unwrap();
        assert!(store.get(&key("quito")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_huge_ttl_never_expires() {
        let store = MemoryCacheStore::new();
        store
            .set_with_expiry(&key("lagos"), "v", i64::MAX as u64)
            .await
            .unwrap();
        store
            .set_with_expiry(&key("accra"), "v", u64::MAX)
            .await
            .unwrap();

        assert_eq!(store.get(&key("lagos")).await.unwrap(), "v");
        assert_eq!(store.get(&key("accra")).await.unwrap(), "v");
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_prune_expired_entries() {
        let store = MemoryCacheStore::new();
        for city in ["oslo", "bergen", "tromso"] {
            store.set_with_expiry(&key(city), "v", 5).await.unwrap();
        }

        tokio::time::advance(Duration::from_secs(6)).await;
        store.set_with_expiry(&key("paris"), "v", 5).await.unwrap();

        assert_eq!(store.entries.lock().len(), 1);
        assert_eq!(store.get(&key("paris")).await.unwrap(), "v");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_and_readers() {
        let store = Arc::new(MemoryCacheStore::new());
        let mut handles = Vec::new();

        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let k = key(&format!("city-{}", i % 4));
                store.set_with_expiry(&k, &i.to_string(), 60).await.unwrap();
                store.get(&k).await.unwrap()
            }));
        }

        for handle in handles {
            let value = handle.await.unwrap();
            assert!(value.parse::<u32>().is_ok());
        }
        assert_eq!(store.len(), 4);
    }
}
