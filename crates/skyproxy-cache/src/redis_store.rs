//! Redis-backed cache store.
//!
//! Commands used: `GET key`, `SET key value`, `SET key value EX seconds`.
//! The connection is a multiplexed [`ConnectionManager`], cloned per call, so
//! concurrent requests share one socket and no client-side lock is held
//! around commands.

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use skyproxy_core::CacheConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

use crate::error::{CacheError, CacheResult};
use crate::key::CacheKey;
use crate::store::CacheStore;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

pub struct RedisCacheStore {
    client: redis::Client,
    endpoint: String,
    connect_timeout: Duration,
    conn: OnceCell<ConnectionManager>,
    closed: AtomicBool,
}

impl std::fmt::Debug for RedisCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheStore")
            .field("endpoint", &self.endpoint)
            .field("connected", &self.conn.initialized())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl RedisCacheStore {
    /// Build a store without touching the network.
    ///
    /// # Errors
    /// Fails only if the connection parameters cannot form a valid URL.
    pub fn new(config: &CacheConfig) -> CacheResult<Self> {
        let url = connection_url(config)?;
        let client = redis::Client::open(url.as_str())?;

        Ok(Self {
            client,
            endpoint: format!("{}:{}", config.host, config.port),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            conn: OnceCell::new(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Build a store and try to connect right away.
    ///
    /// A failed first connection is logged, not returned: the store stays
    /// usable and reconnects on the next command, and callers fall back to
    /// the upstream API in the meantime.
    pub async fn connect(config: &CacheConfig) -> CacheResult<Self> {
        let store = Self::new(config)?;

        match store.connection().await {
            Ok(_) => tracing::info!("Successfully connected to redis at {}", store.endpoint),
            Err(e) => tracing::error!("Error connecting to redis at {}: {}", store.endpoint, e),
        }

        Ok(store)
    }

    /// Stop serving commands. Later operations fail with `CacheError::Closed`;
    /// the socket is released when the store is dropped.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::info!("Closing redis connection to {}", self.endpoint);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn connection(&self) -> CacheResult<ConnectionManager> {
        if self.is_closed() {
            return Err(CacheError::Closed);
        }

        let conn = self
            .conn
            .get_or_try_init(|| async {
                // Single attempt; the next command tries again.
                let config = ConnectionManagerConfig::new()
                    .set_number_of_retries(0)
                    .set_connection_timeout(self.connect_timeout);

                match tokio::time::timeout(
                    self.connect_timeout,
                    ConnectionManager::new_with_config(self.client.clone(), config),
                )
                .await
                {
                    Ok(result) => result.map_err(CacheError::from),
                    Err(_) => Err(CacheError::ConnectTimeout(self.endpoint.clone())),
                }
            })
            .await?;

        Ok(conn.clone())
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &CacheKey) -> CacheResult<String> {
        let rendered = key.to_string();
        let mut conn = self.connection().await?;

        let value: Option<String> = conn.get(&rendered).await.map_err(|e| {
            tracing::warn!(key = %rendered, "Redis GET failed: {}", e);
            CacheError::from(e)
        })?;

        match value {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(CacheError::NotFound(rendered)),
        }
    }

    async fn set(&self, key: &CacheKey, value: &str) -> CacheResult<()> {
        let rendered = key.to_string();
        let mut conn = self.connection().await?;

        conn.set::<_, _, ()>(&rendered, value).await.map_err(|e| {
            tracing::warn!(key = %rendered, "Redis SET failed: {}", e);
            CacheError::from(e)
        })
    }

    async fn set_with_expiry(
        &self,
        key: &CacheKey,
        value: &str,
        ttl_seconds: u64,
    ) -> CacheResult<()> {
        let rendered = key.to_string();
        let mut conn = self.connection().await?;

        conn.set_ex::<_, _, ()>(&rendered, value, ttl_seconds)
            .await
            .map_err(|e| {
                tracing::warn!(key = %rendered, ttl_seconds, "Redis SET EX failed: {}", e);
                CacheError::from(e)
            })
    }
}

/// Build the `redis://` URL for the given connection parameters.
///
/// An empty password means no AUTH. The password is percent-encoded.
pub fn connection_url(config: &CacheConfig) -> CacheResult<Url> {
    let mut url = Url::parse(&format!("redis://{}:{}/", config.host, config.port))
        .map_err(|e| CacheError::Config(format!("{}:{}: {}", config.host, config.port, e)))?;

    if !config.password.is_empty() {
        url.set_password(Some(&config.password))
            .map_err(|_| CacheError::Config("password cannot be set on this URL".into()))?;
    }

    Ok(url)
}
