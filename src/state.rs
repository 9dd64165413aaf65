/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - ex: authz: AuthzService, pats: PatService, cache: CacheProbe など
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;
use std::time::Duration;

use crate::config::MissingCredentialPolicy;
use crate::services::{
    authz::{AuthzService, HeaderKeys},
    cache::CacheProbe,
    pat::PatService,
};

/// Per-request inputs of an authorization check, fixed at startup.
#[derive(Clone, Debug)]
pub struct CheckSettings {
    pub cache_ttl: Duration,
    pub header_keys: HeaderKeys,
    pub missing_credential: MissingCredentialPolicy,
}

#[derive(Clone)]
pub struct AppState {
    pub authz: Arc<AuthzService>,
    pub pats: Arc<PatService>,
    pub cache: Arc<dyn CacheProbe>,
    pub check: Arc<CheckSettings>,
}

impl AppState {
    pub fn new(
        authz: Arc<AuthzService>,
        pats: Arc<PatService>,
        cache: Arc<dyn CacheProbe>,
        check: CheckSettings,
    ) -> Self {
        Self {
            authz,
            pats,
            cache,
            check: Arc::new(check),
        }
    }
}
