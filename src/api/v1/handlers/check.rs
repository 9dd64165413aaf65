/*
 * Responsibility
 * - POST /envoy.service.auth.v3.Authorization/Check (ext_authz v3 の JSON 表現)
 * - attributes.request.http.headers の authorization → AuthzService::authorize
 * - allow → okResponse.headers, deny → deniedResponse (401 + reason), 内部エラー → deniedResponse (500)
 */
use axum::{Json, extract::State};
use tracing::{debug, error, info, warn};

use crate::api::v1::dto::check::{CheckRequest, CheckResponse};
use crate::error::AppError;
use crate::services::authz::Decision;
use crate::state::AppState;

pub async fn check(
    State(state): State<AppState>,
    Json(req): Json<CheckRequest>,
) -> Result<Json<CheckResponse>, AppError> {
    let http = req
        .attributes
        .request
        .http
        .ok_or_else(|| AppError::bad_request("INVALID_ARGUMENT", "missing HTTP request"))?;

    let decision = match http.authorization() {
        Some(raw) => {
            state
                .authz
                .authorize(raw, state.check.cache_ttl, &state.check.header_keys)
                .await
        }
        None => {
            debug!(method = %http.method, path = %http.path, "Missing authorization header");
            Ok(state.check.missing_credential.decision())
        }
    };

    let response = match decision {
        Ok(Decision::Allow { headers }) => {
            info!(method = %http.method, path = %http.path, "Authorization allowed");
            CheckResponse::ok(&headers)
        }
        Ok(Decision::Deny { reason }) => {
            warn!(method = %http.method, path = %http.path, reason = %reason, "Authorization denied");
            CheckResponse::denied(401, reason)
        }
        Err(err) => {
            error!(error = %err, "Authorization check failed");
            CheckResponse::denied(500, "internal server error")
        }
    };

    Ok(Json(response))
}
