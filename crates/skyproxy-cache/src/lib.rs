//! Cache store for skyproxy
//!
//! A small key-value contract (`get` / `set` / `set_with_expiry`) with a
//! Redis implementation for production and an in-memory one for tests and
//! cache-less local runs.

pub mod error;
pub mod key;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use error::{CacheError, CacheResult};
pub use key::{normalize_id, CacheKey};
pub use memory::MemoryCacheStore;
pub use redis_store::RedisCacheStore;
pub use store::{CacheStore, CacheStoreExt};
