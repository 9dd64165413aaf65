/*
 * Responsibility
 * - forward-auth エンドポイント (/oauth2/token-exchange, /oauth2/token-exchange/{*path})
 * - Authorization ヘッダー → AuthzService::authorize → 200 + identity headers / 401 + {"error"}
 * - 内部エラーは 500 (deny とは区別する)
 */
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::services::authz::decision::reason;
use crate::services::authz::{Decision, IdentityHeaders};
use crate::state::AppState;

pub async fn forward_auth(State(state): State<AppState>, headers: HeaderMap) -> Response {
    // Only an absent header falls under the missing-credential policy.
    let decision = match headers.get(header::AUTHORIZATION) {
        None => {
            debug!(policy = ?state.check.missing_credential, "Missing authorization header");
            Ok(state.check.missing_credential.decision())
        }
        Some(value) => match std::str::from_utf8(value.as_bytes()) {
            Ok(raw) => {
                state
                    .authz
                    .authorize(raw, state.check.cache_ttl, &state.check.header_keys)
                    .await
            }
            Err(_) => Ok(Decision::deny(reason::UNREADABLE_HEADER)),
        },
    };

    match decision {
        Ok(Decision::Allow { headers }) => {
            info!(headers = headers.len(), "Authorization allowed");
            (StatusCode::OK, response_headers(&headers)).into_response()
        }
        Ok(Decision::Deny { reason }) => {
            warn!(reason = %reason, "Authorization denied");
            unauthorized(&reason)
        }
        Err(err) => {
            error!(error = %err, "Authorization check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "internal server error"})),
            )
                .into_response()
        }
    }
}

fn unauthorized(reason: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": reason}))).into_response()
}

/// Identity headers as response headers; values that are not valid header
/// values are dropped rather than failing the request.
fn response_headers(identity: &IdentityHeaders) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(identity.len());
    for (name, value) in identity.iter() {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                out.insert(name, value);
            }
            _ => warn!(header = name, "Dropping identity header with invalid value"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    use crate::api::v1::test_support::{TestApp, cached_identity};
    use crate::config::MissingCredentialPolicy;

    use super::*;

    async fn call(app: &TestApp, method: Method, uri: &str, auth: Option<&str>) -> Response {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            req = req.header("authorization", auth);
        }
        app.router()
            .oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn allow_sets_identity_headers() {
        let app = TestApp::new();
        app.seed("tok", &cached_identity());

        let res = call(&app, Method::GET, "/oauth2/token-exchange/api/v1/x", Some("Bearer tok")).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["x-user-id"], "user-123");
        assert_eq!(res.headers()["x-user-email"], "test@example.com");
        assert_eq!(res.headers()["x-user-groups"], "group1");
    }

    #[tokio::test]
    async fn any_method_and_bare_prefix_are_routed() {
        let app = TestApp::new();
        app.seed("tok", &cached_identity());

        let post = call(&app, Method::POST, "/oauth2/token-exchange", Some("tok")).await;
        let delete = call(&app, Method::DELETE, "/oauth2/token-exchange/a/b", Some("tok")).await;

        assert_eq!(post.status(), StatusCode::OK);
        assert_eq!(delete.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn deny_is_401_with_reason() {
        let app = TestApp::new();

        let res = call(&app, Method::GET, "/oauth2/token-exchange/x", Some("Bearer ")).await;

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "empty credential");
    }

    #[tokio::test]
    async fn exchange_failure_is_401_not_500() {
        let app = TestApp::new();

        let res = call(&app, Method::GET, "/oauth2/token-exchange/x", Some("unknown")).await;

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_header_follows_policy() {
        let deny = TestApp::new();
        let res = call(&deny, Method::GET, "/oauth2/token-exchange/x", None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let allow = TestApp::with_policy(MissingCredentialPolicy::Allow);
        let res = call(&allow, Method::GET, "/oauth2/token-exchange/x", None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(!res.headers().contains_key("x-user-id"));
    }

    #[tokio::test]
    async fn internal_error_is_500() {
        let app = TestApp::with_broken_header_keys();
        app.seed("tok", &cached_identity());

        let res = call(&app, Method::GET, "/oauth2/token-exchange/x", Some("tok")).await;

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "internal server error");
    }

    async fn error_of(res: Response) -> String {
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        json["error"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn blank_header_is_denied_even_when_missing_is_allowed() {
        let app = TestApp::with_policy(MissingCredentialPolicy::Allow);

        for value in ["   ", "Bearer ", "bearer    "] {
            let res = call(&app, Method::GET, "/oauth2/token-exchange/x", Some(value)).await;
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{value:?}");
            assert_eq!(error_of(res).await, reason::EMPTY_CREDENTIAL);
        }
    }

    #[tokio::test]
    async fn non_utf8_header_is_denied_even_when_missing_is_allowed() {
        let app = TestApp::with_policy(MissingCredentialPolicy::Allow);
        let req = Request::get("/oauth2/token-exchange/x")
            .header(
                header::AUTHORIZATION,
                HeaderValue::from_bytes(b"Bearer \xff\xfe").unwrap(),
            )
            .body(Body::empty())
            .unwrap();

        let res = app.router().oneshot(req).await.unwrap();

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_of(res).await, reason::UNREADABLE_HEADER);
    }
}
