//! CORS policy for browser clients of the PAT management surface.
//!
//! Note:
//! - CORS is enforced by browsers. The edge proxy calling the check endpoints is
//!   not restricted by it, so only the PAT routes get this layer.
//!
//! Policy:
//! - Allowlist configured: exact-match origins, WITHOUT credentials.
//! - Development without allowlist: permissive (Allow-Origin: *), WITHOUT credentials.
//! - Production without allowlist: no origin allowed.

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::Config;
use crate::state::AppState;

/// Apply CORS policy to the given Router.
///
/// IMPORTANT:
/// - Do not combine wildcard origin (`Any`) with `allow_credentials(true)`.
pub fn apply(router: Router<AppState>, config: &Config) -> Router<AppState> {
    router.layer(layer(config))
}

fn layer(config: &Config) -> CorsLayer {
    let cors = if config.cors_allowed_origins.is_empty() && !config.app_env.is_production() {
        CorsLayer::new().allow_origin(Any)
    } else {
        // An empty allowlist in production matches nothing (no CORS headers),
        // which is safer than accidentally allowing all.
        let allowed: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|s| HeaderValue::from_str(s).ok())
            .collect();

        let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _req| {
            allowed.iter().any(|v| v == origin)
        });

        CorsLayer::new().allow_origin(allow_origin)
    };

    cors.allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("connect-protocol-version"),
            HeaderName::from_static("connect-timeout-ms"),
            HeaderName::from_static("x-auth-request-user"),
            HeaderName::from_static("x-auth-request-email"),
            HeaderName::from_static("x-auth-request-preferred-username"),
            HeaderName::from_static("x-request-id"),
        ])
        .max_age(std::time::Duration::from_secs(60 * 10))
}
