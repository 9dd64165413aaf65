/// Factory: build process-wide clients and services from application `Config`.
///
/// Every client is constructed exactly once here and injected; nothing is
/// created lazily per request.
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::services::authz::{AuthzService, ValkeyTokenCache};
use crate::services::cache::{CacheClient, CacheError, ValkeyClient};
use crate::services::idp::{IdpError, IdpSettings, RetryConfig, ZitadelClient};
use crate::services::pat::PatService;

/// Connects to the cache backend and fails unless it answers a ping.
pub async fn build_cache_client(config: &Config) -> Result<Arc<ValkeyClient>, CacheError> {
    let client = ValkeyClient::new(&config.redis_url).await?;
    client.ping().await?;

    info!(backend = client.backend_name(), "Cache backend reachable");
    Ok(Arc::new(client))
}

pub fn build_idp_client(config: &Config) -> Result<Arc<ZitadelClient>, IdpError> {
    let client = ZitadelClient::new(IdpSettings {
        issuer: config.idp.issuer.clone(),
        client_id: config.idp.client_id.clone(),
        client_secret: config.idp.client_secret.clone(),
        organization_id: config.idp.organization_id.clone(),
        timeout: config.idp.timeout,
        retry: RetryConfig::with_max_retries(config.idp.max_retries),
    })?;

    Ok(Arc::new(client))
}

pub fn build_authz_service(
    config: &Config,
    cache: Arc<ValkeyClient>,
    idp: Arc<ZitadelClient>,
) -> Arc<AuthzService> {
    let tokens = ValkeyTokenCache::new(cache, config.cache_key_prefix.clone());
    let strategy = config.exchange_strategy();

    info!(strategy = ?strategy, "Authorization engine configured");
    Arc::new(AuthzService::new(Arc::new(tokens), idp, strategy))
}

pub fn build_pat_service(config: &Config, idp: Arc<ZitadelClient>) -> Arc<PatService> {
    if config.idp.admin_pat.is_empty() {
        warn!("IDP_ADMIN_PAT is not set; PAT management calls will be rejected by the IdP");
    }

    Arc::new(PatService::new(idp, config.idp.admin_pat.clone()))
}
