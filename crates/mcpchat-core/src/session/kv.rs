//! Key/value substrate with per-entry TTL
//!
//! Values are stored serialized. Every write sets the entry's TTL afresh;
//! reads never extend it.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::SessionResult;

/// Cache/KV substrate
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Raw value, or `None` when absent or expired
    async fn get(&self, key: &str) -> SessionResult<Option<String>>;

    /// Store a value for `ttl`
    async fn set(&self, key: &str, value: String, ttl: Duration) -> SessionResult<()>;

    /// Remove a key; absent keys are not an error
    async fn delete(&self, key: &str) -> SessionResult<()>;
}

/// Read and deserialize a JSON value
pub async fn get_serialized<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> SessionResult<Option<T>> {
    match store.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Serialize and write a JSON value
pub async fn set_serialized<T: Serialize + ?Sized>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> SessionResult<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, raw, ttl).await
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    ttl: Duration,
}

struct EntryExpiry;

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process store backed by a moka cache
pub struct MemoryKvStore {
    cache: Cache<String, Entry>,
}

impl MemoryKvStore {
    pub const DEFAULT_CAPACITY: u64 = 100_000;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Bound the number of live entries
    pub fn with_capacity(max_entries: u64) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(max_entries)
                .expire_after(EntryExpiry)
                .build(),
        }
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> SessionResult<Option<String>> {
        Ok(self.cache.get(key).await.map(|e| e.value))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> SessionResult<()> {
        self.cache.insert(key.to_string(), Entry { value, ttl }).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> SessionResult<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }
}
