//! Router wired to in-memory doubles, for handler tests.
use std::sync::Arc;
use std::time::Duration;

use axum::Router;

use crate::api::v1::routes;
use crate::config::{Config, MissingCredentialPolicy};
use crate::services::authz::{
    AuthzService, ExchangeStrategy, HeaderKeys, ValkeyTokenCache, credential,
    engine::testing::FakeExchange,
    token_cache::{CachedIdentity, testing::MemoryCache},
};
use crate::services::pat::{PatService, service::testing::FakeDirectory};
use crate::state::{AppState, CheckSettings};

const KEY_PREFIX: &str = "authz:pat";

pub struct TestApp {
    pub cache: MemoryCache,
    pub directory: Arc<FakeDirectory>,
    state: AppState,
    config: Config,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(MissingCredentialPolicy::Deny, HeaderKeys::default())
    }

    pub fn with_policy(policy: MissingCredentialPolicy) -> Self {
        Self::build(policy, HeaderKeys::default())
    }

    /// Header keys the engine rejects, so every check ends in an internal error.
    pub fn with_broken_header_keys() -> Self {
        let keys = HeaderKeys {
            user_id: String::new(),
            ..HeaderKeys::default()
        };
        Self::build(MissingCredentialPolicy::Deny, keys)
    }

    fn build(policy: MissingCredentialPolicy, header_keys: HeaderKeys) -> Self {
        let config = Config::from_lookup(|key| {
            let value = match key {
                "REDIS_URL" => "redis://localhost:6379",
                "IDP_ISSUER" => "https://idp.example.com",
                "IDP_CLIENT_ID" => "client",
                "IDP_CLIENT_SECRET" => "secret",
                "IDP_ADMIN_PAT" => "admin-pat",
                _ => return None,
            };
            Some(value.to_string())
        })
        .unwrap();

        let cache = MemoryCache::default();
        let tokens = ValkeyTokenCache::new(Arc::new(cache.clone()), KEY_PREFIX);
        let authz = AuthzService::new(
            Arc::new(tokens),
            Arc::new(FakeExchange::default()),
            ExchangeStrategy::Delegated {
                actor_token: "admin-pat".into(),
            },
        );

        let directory = Arc::new(FakeDirectory::default());
        let pats = PatService::new(directory.clone(), "admin-pat");

        let state = AppState::new(
            Arc::new(authz),
            Arc::new(pats),
            Arc::new(cache.clone()),
            CheckSettings {
                cache_ttl: Duration::from_secs(300),
                header_keys,
                missing_credential: policy,
            },
        );

        Self {
            cache,
            directory,
            state,
            config,
        }
    }

    /// Stores `identity` as the cached result for `raw_credential`.
    pub fn seed(&self, raw_credential: &str, identity: &CachedIdentity) {
        let hash = credential::hash(credential::normalize(raw_credential));
        let value = serde_json::to_string(identity).unwrap();
        self.cache.entries.lock().unwrap().insert(
            format!("{KEY_PREFIX}:{hash}"),
            (value, Duration::from_secs(300)),
        );
    }

    pub fn router(&self) -> Router {
        routes(&self.config).with_state(self.state.clone())
    }
}

pub fn cached_identity() -> CachedIdentity {
    CachedIdentity {
        user_id: "user-123".into(),
        email: "test@example.com".into(),
        groups: vec!["group1".into()],
        ..CachedIdentity::default()
    }
}
