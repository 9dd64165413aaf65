//! Cache client interface used by higher-level services (credential cache, readiness).
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-layer errors (transport/command/serialization).
///
/// Note:
/// - We keep this independent from `AppError` so callers can decide how to fail.
///   The authorization path degrades to an exchange on read failure and swallows
///   write failures; startup treats a failed ping as fatal.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    BackendConnection(String),
    #[error("cache command error: {0}")]
    BackendCommand(String),
    #[error("cache value error: {0}")]
    InvalidValue(String),
}

/// A minimal, string-based cache interface.
///
/// The credential cache only needs `GET` and `SET ... EX`; readiness needs `PING`.
///
/// Implementations must be cheap to clone (typically `Arc<...>` inside) and safe
/// to share across every request task.
#[async_trait]
pub trait CacheClient: Clone + Send + Sync + 'static {
    // Returns the cache backend name (for logging).
    fn backend_name(&self) -> &'static str;

    // Round-trip to the backend.
    async fn ping(&self) -> CacheResult<()>;

    // Get UTF-8 string value. `Ok(None)` when the key does not exist (or expired).
    async fn get_string(&self, key: &str) -> CacheResult<Option<String>>;

    // Set value unconditionally, overwriting any previous value, with TTL.
    // Expiry is enforced by the backend.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;
}

/// Object-safe view of a cache used by readiness checks.
#[async_trait]
pub trait CacheProbe: Send + Sync {
    fn backend_name(&self) -> &'static str;
    async fn ping(&self) -> CacheResult<()>;
}

#[async_trait]
impl<C: CacheClient> CacheProbe for C {
    fn backend_name(&self) -> &'static str {
        CacheClient::backend_name(self)
    }

    async fn ping(&self) -> CacheResult<()> {
        CacheClient::ping(self).await
    }
}
