use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CacheResult;
use crate::key::CacheKey;

/// Key-value cache contract.
///
/// Implementations are shared across concurrent requests; atomicity of a
/// single operation is the backend's job, callers take no locks.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    /// `CacheError::NotFound` if the key is absent or expired; any other
    /// variant means the backend could not answer.
    async fn get(&self, key: &CacheKey) -> CacheResult<String>;

    /// Store a value with no expiry.
    async fn set(&self, key: &CacheKey, value: &str) -> CacheResult<()>;

    /// Store a value that becomes unreadable after `ttl_seconds`.
    async fn set_with_expiry(&self, key: &CacheKey, value: &str, ttl_seconds: u64)
        -> CacheResult<()>;
}

/// JSON helpers on top of any [`CacheStore`].
#[async_trait]
pub trait CacheStoreExt: CacheStore {
    async fn get_json<T>(&self, key: &CacheKey) -> CacheResult<T>
    where
        T: DeserializeOwned + Send,
    {
        let raw = self.get(key).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn set_json<T>(&self, key: &CacheKey, value: &T) -> CacheResult<()>
    where
        T: Serialize + Sync,
    {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw).await
    }

    async fn set_json_with_expiry<T>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl_seconds: u64,
    ) -> CacheResult<()>
    where
        T: Serialize + Sync,
    {
        let raw = serde_json::to_string(value)?;
        self.set_with_expiry(key, &raw, ttl_seconds).await
    }
}

impl<S: CacheStore + ?Sized> CacheStoreExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use crate::memory::MemoryCacheStore;
    use std::sync::Arc;

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Reading {
        city: String,
        temp: i32,
    }

    #[tokio::test]
    async fn test_json_round_trip_through_dyn_store() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());
        let key = CacheKey::new("weather", "Oslo");
        let reading = Reading {
            city: "Oslo".into(),
            temp: -3,
        };

        store.set_json_with_expiry(&key, &reading, 60).await.unwrap();
        let back: Reading = store.get_json(&key).await.unwrap();
        assert_eq!(back, reading);
    }

    #[tokio::test]
    async fn test_garbage_payload_is_serialization_error() {
        let store = MemoryCacheStore::new();
        let key = CacheKey::new("weather", "oslo");
        store.set(&key, "{not json").await.unwrap();

        let result: CacheResult<Reading> = store.get_json(&key).await;
        let err = result.unwrap_err();
        assert!(matches!(err, CacheError::Serialization(_)));
    }
}
