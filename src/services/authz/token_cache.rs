use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::services::cache::{CacheClient, CacheError};

/// Identity resolved by a previous successful exchange.
///
/// Field names are the stored JSON names; unknown fields are ignored and
/// missing ones default so records written by other versions stay readable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CachedIdentity {
    pub access_token: String,
    pub user_id: String,
    pub email: String,
    pub groups: Vec<String>,
    pub preferred_username: String,
}

/// Record-level credential cache keyed by credential hash.
///
/// - `Ok(None)`: miss (absent or expired, not distinguished)
/// - `Err(_)`: backend or decoding failure; callers decide how to degrade
pub trait TokenCache: Send + Sync {
    fn get<'a>(
        &'a self,
        hash: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<CachedIdentity>, CacheError>> + Send + 'a>>;

    // Overwrites any previous record for `hash`; expiry is enforced by the backend.
    fn set<'a>(
        &'a self,
        hash: &'a str,
        record: &'a CachedIdentity,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + 'a>>;
}

/// `TokenCache` over any string cache, storing compact JSON under
/// `"{prefix}:{hash}"`.
#[derive(Clone)]
pub struct ValkeyTokenCache<C: CacheClient> {
    cache: Arc<C>,
    // Namespace inside a shared keyspace
    prefix: String,
}

impl<C: CacheClient> ValkeyTokenCache<C> {
    pub fn new(cache: Arc<C>, prefix: impl Into<String>) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
        }
    }

    pub fn key(&self, hash: &str) -> String {
        format!("{}:{}", self.prefix, hash)
    }
}

impl<C: CacheClient> TokenCache for ValkeyTokenCache<C> {
    fn get<'a>(
        &'a self,
        hash: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<CachedIdentity>, CacheError>> + Send + 'a>>
    {
        Box::pin(async move {
            let Some(raw) = self.cache.get_string(&self.key(hash)).await? else {
                return Ok(None);
            };

            let record = serde_json::from_str(&raw)
                .map_err(|e| CacheError::InvalidValue(e.to_string()))?;
            Ok(Some(record))
        })
    }

    fn set<'a>(
        &'a self,
        hash: &'a str,
        record: &'a CachedIdentity,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + 'a>> {
        Box::pin(async move {
            let value =
                serde_json::to_string(record).map_err(|e| CacheError::InvalidValue(e.to_string()))?;

            self.cache.set_with_ttl(&self.key(hash), &value, ttl).await
        })
    }
}
