//! Cache client interface used by higher-level services (directory DN / group caches).
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-layer errors (transport/command).
///
/// Note:
/// - We keep this independent from `AppError` so callers can decide how to fail
///   (the directory authorizer treats a cache failure as a miss).
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    BackendConnection(String),
    #[error("cache command error: {0}")]
    BackendCommand(String),
}

/// A minimal TTL cache interface.
///
/// - String values, every entry carries its own TTL.
/// - Entries are replaced wholesale on `set_with_ttl`, never mutated in place.
/// - Expired entries are never returned by `get_string`.
///
/// Shared as `Arc<dyn CacheClient>`.
#[async_trait]
pub trait CacheClient: Send + Sync + 'static {
    // Returns the cache backend name (for logging).
    fn backend_name(&self) -> &'static str;

    // Get UTF-8 string value, `None` when missing or expired.
    async fn get_string(&self, key: &str) -> CacheResult<Option<String>>;

    // Insert or replace `key` with a fresh TTL.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    // Drop every entry owned by this client.
    async fn clear(&self) -> CacheResult<()>;
}
