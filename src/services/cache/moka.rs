//! In-process cache backed by Moka.
//!
//! Each entry remembers when it was inserted and its own TTL; expiry is checked
//! lazily on read. Moka provides the concurrent map and the capacity bound.

use async_trait::async_trait;
use moka::future::Cache;
use std::time::{Duration, Instant};

use crate::services::cache::client::{CacheClient, CacheResult};

pub const DEFAULT_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) >= self.ttl
    }
}

#[derive(Clone)]
pub struct MokaClient {
    cache: Cache<String, CacheEntry>,
}

impl Default for MokaClient {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl MokaClient {
    pub fn with_capacity(max_entries: u64) -> Self {
        let cache = Cache::builder().max_capacity(max_entries).build();
        Self { cache }
    }
}

impl std::fmt::Debug for MokaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaClient")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

#[async_trait]
impl CacheClient for MokaClient {
    fn backend_name(&self) -> &'static str {
        "moka"
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        let Some(entry) = self.cache.get(key).await else {
            return Ok(None);
        };

        if entry.is_expired(Instant::now()) {
            self.cache.invalidate(key).await;
            return Ok(None);
        }

        Ok(Some(entry.value))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let entry = CacheEntry {
            value: value.to_string(),
            inserted_at: Instant::now(),
            ttl,
        };
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }
}
