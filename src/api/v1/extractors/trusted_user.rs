/*
 * Responsibility
 * - edge (oauth2-proxy 等) が付与した X-Auth-Request-* ヘッダーから呼び出しユーザーを取り出す
 * - X-Auth-Request-User が無ければ 401 (unauthenticated)
 *
 * Notes
 * - ヘッダーは信頼済み upstream が設定する前提 (ここでは検証しない)
 */
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};

use crate::error::AppError;
use crate::services::pat::HumanUser;

pub const HEADER_USER: &str = "x-auth-request-user";
pub const HEADER_EMAIL: &str = "x-auth-request-email";
pub const HEADER_PREFERRED_USERNAME: &str = "x-auth-request-preferred-username";

/// Caller identity for PAT management handlers.
pub struct TrustedUser(pub HumanUser);

impl<S> FromRequestParts<S> for TrustedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(&parts.headers, HEADER_USER)
            .ok_or(AppError::Unauthenticated("missing X-Auth-Request-User header"))?;

        Ok(TrustedUser(HumanUser {
            id,
            email: header(&parts.headers, HEADER_EMAIL).unwrap_or_default(),
            preferred_username: header(&parts.headers, HEADER_PREFERRED_USERNAME)
                .unwrap_or_default(),
        }))
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
