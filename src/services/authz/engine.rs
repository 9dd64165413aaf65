//! Authorization decision pipeline.
//!
//! normalize → hash → cache lookup → (miss) exchange → parse claims →
//! cache write → header set. Every upstream or cache fault on this path is
//! folded into a `Decision::Deny`; `Err` is reserved for internal faults.
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::services::authz::claims;
use crate::services::authz::credential;
use crate::services::authz::decision::{Decision, HeaderKeys, IdentityHeaders, reason};
use crate::services::authz::token_cache::{CachedIdentity, TokenCache};
use crate::services::idp::{ExchangeClient, token_type};

/// How a credential that is not cached gets resolved, fixed at wiring time.
#[derive(Clone, PartialEq, Eq)]
pub enum ExchangeStrategy {
    /// No exchange path; every cache miss is denied.
    Disabled,
    /// The credential itself is the subject of a token exchange.
    Simple,
    /// User-info lookup with the credential, then an exchange for that user
    /// authorized by `actor_token`.
    Delegated { actor_token: String },
}

impl std::fmt::Debug for ExchangeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::Simple => f.write_str("Simple"),
            Self::Delegated { .. } => f.write_str("Delegated"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthzError {
    #[error("header key for {0} is empty")]
    InvalidHeaderKey(&'static str),
}

pub struct AuthzService {
    cache: Arc<dyn TokenCache>,
    idp: Arc<dyn ExchangeClient>,
    strategy: ExchangeStrategy,
}

impl AuthzService {
    pub fn new(
        cache: Arc<dyn TokenCache>,
        idp: Arc<dyn ExchangeClient>,
        strategy: ExchangeStrategy,
    ) -> Self {
        Self {
            cache,
            idp,
            strategy,
        }
    }

    /// Decide whether `raw_credential` (optionally `Bearer `-prefixed) is
    /// allowed, and with which identity headers.
    ///
    /// A cache hit makes no outbound call; a miss makes at most two.
    /// `cache_ttl` only applies to the record written after a miss.
    pub async fn authorize(
        &self,
        raw_credential: &str,
        cache_ttl: Duration,
        keys: &HeaderKeys,
    ) -> Result<Decision, AuthzError> {
        validate_keys(keys)?;

        let credential = credential::normalize(raw_credential);
        if credential.is_empty() {
            debug!("Denied empty credential");
            return Ok(Decision::deny(reason::EMPTY_CREDENTIAL));
        }

        let prefix = credential::log_prefix(credential);
        let hash = credential::hash(credential);

        match self.cache.get(&hash).await {
            Ok(Some(record)) => {
                debug!(credential = %prefix, "Credential cache hit");
                return Ok(allow(&record, keys));
            }
            Ok(None) => debug!(credential = %prefix, "Credential cache miss"),
            Err(err) => warn!(
                credential = %prefix,
                error = %err,
                "Credential cache read failed, exchanging"
            ),
        }

        let resolved = match &self.strategy {
            ExchangeStrategy::Simple => self.exchange_simple(credential).await,
            ExchangeStrategy::Delegated { actor_token } if !actor_token.is_empty() => {
                self.exchange_delegated(credential, actor_token).await
            }
            _ => Err(reason::NOT_CONFIGURED.to_string()),
        };

        let record = match resolved {
            Ok(record) => record,
            Err(reason) => {
                info!(credential = %prefix, reason = %reason, "Authorization denied");
                return Ok(Decision::Deny { reason });
            }
        };

        if let Err(err) = self.cache.set(&hash, &record, cache_ttl).await {
            warn!(credential = %prefix, error = %err, "Credential cache write failed");
        }

        debug!(credential = %prefix, user_id = %record.user_id, "Authorization allowed");
        Ok(allow(&record, keys))
    }

    async fn exchange_simple(&self, credential: &str) -> Result<CachedIdentity, String> {
        let token = self
            .idp
            .exchange(credential)
            .await
            .map_err(|e| reason::exchange_failed(&e))?;

        let claims = claims::parse_unverified(token.id_token.as_deref().unwrap_or_default())
            .map_err(|e| reason::id_token_invalid(&e))?;

        Ok(identity(token.access_token, claims))
    }

    async fn exchange_delegated(
        &self,
        credential: &str,
        actor_token: &str,
    ) -> Result<CachedIdentity, String> {
        let info = self
            .idp
            .get_user_info(credential)
            .await
            .map_err(|e| reason::user_info_failed(&e))?;

        let username = if info.preferred_username.is_empty() {
            info.sub.as_str()
        } else {
            info.preferred_username.as_str()
        };
        if username.is_empty() {
            return Err(reason::NO_USERNAME.to_string());
        }

        let token = self
            .idp
            .exchange_with_actor(username, token_type::USER_ID, actor_token)
            .await
            .map_err(|e| reason::exchange_failed(&e))?;

        let claims = claims::parse_unverified(token.id_token.as_deref().unwrap_or_default())
            .map_err(|e| reason::id_token_invalid(&e))?;

        Ok(identity(token.access_token, claims))
    }
}

fn validate_keys(keys: &HeaderKeys) -> Result<(), AuthzError> {
    let labelled = [
        ("user_id", &keys.user_id),
        ("user_email", &keys.user_email),
        ("user_groups", &keys.user_groups),
        ("user_preferred_username", &keys.user_preferred_username),
        ("user_jwt", &keys.user_jwt),
    ];
    match labelled.iter().find(|(_, name)| name.is_empty()) {
        Some((label, _)) => Err(AuthzError::InvalidHeaderKey(label)),
        None => Ok(()),
    }
}

fn identity(access_token: String, claims: claims::IdTokenClaims) -> CachedIdentity {
    CachedIdentity {
        access_token,
        user_id: claims.sub,
        email: claims.email,
        groups: claims.groups,
        preferred_username: claims.preferred_username,
    }
}

/// Hits and misses both go through here so equal records give equal headers.
fn allow(record: &CachedIdentity, keys: &HeaderKeys) -> Decision {
    let mut headers = IdentityHeaders::default();
    headers.insert_non_empty(&keys.user_id, &record.user_id);
    headers.insert_non_empty(&keys.user_email, &record.email);
    headers.insert_non_empty(&keys.user_groups, &record.groups.join(","));
    headers.insert_non_empty(&keys.user_preferred_username, &record.preferred_username);
    headers.insert_non_empty(&keys.user_jwt, &record.access_token);
    Decision::Allow { headers }
}
