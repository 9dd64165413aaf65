/*
 * Responsibility
 * - URL 構造を定義
 * - /healthz, /readyz (probe)
 * - /oauth2/token-exchange/{*path} (forward-auth, 全メソッド)
 * - /envoy.service.auth.v3.Authorization/Check (ext_authz JSON)
 * - /pat.v1.PATService/{method} (PAT 管理, CORS はここだけに適用)
 */
use axum::{
    Router,
    routing::{any, get, post},
};

use crate::api::v1::handlers::{
    check::check,
    forward_auth::forward_auth,
    health::{health, ready},
    pats::{create_pat, delete_pat, list_pats},
};
use crate::config::Config;
use crate::middleware::cors;
use crate::state::AppState;

pub fn routes(config: &Config) -> Router<AppState> {
    let pats = Router::new()
        .route("/pat.v1.PATService/CreatePAT", post(create_pat))
        .route("/pat.v1.PATService/ListPATs", post(list_pats))
        .route("/pat.v1.PATService/DeletePAT", post(delete_pat));

    Router::new()
        .route("/healthz", get(health))
        .route("/readyz", get(ready))
        .route("/oauth2/token-exchange", any(forward_auth))
        .route("/oauth2/token-exchange/{*path}", any(forward_auth))
        .route("/envoy.service.auth.v3.Authorization/Check", post(check))
        .merge(cors::apply(pats, config))
}
