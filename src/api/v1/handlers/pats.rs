/*
 * Responsibility
 * - PATService (Connect 形式の JSON unary) handler: CreatePAT / ListPATs / DeletePAT
 * - 呼び出しユーザーは TrustedUser extractor (X-Auth-Request-*) から取得
 * - DTO validation → PatService 呼び出し → AppError へ変換
 */
use axum::{Json, extract::State};
use tracing::info;

use crate::{
    api::v1::{
        dto::pats::{
            CreatePatRequest, CreatePatResponse, DeletePatRequest, DeletePatResponse,
            ListPatsResponse,
        },
        extractors::TrustedUser,
    },
    error::AppError,
    state::AppState,
};

pub async fn create_pat(
    State(state): State<AppState>,
    TrustedUser(user): TrustedUser,
    Json(req): Json<CreatePatRequest>,
) -> Result<Json<CreatePatResponse>, AppError> {
    let expiration = req
        .validate()
        .map_err(|msg| AppError::bad_request("INVALID_ARGUMENT", msg))?;

    info!(user_id = %user.id, expiration = %expiration, "Creating PAT");
    let (pat, token) = state.pats.create_pat(&user, expiration).await?;

    Ok(Json(CreatePatResponse {
        pat: pat.into(),
        token,
    }))
}

pub async fn list_pats(
    State(state): State<AppState>,
    TrustedUser(user): TrustedUser,
) -> Result<Json<ListPatsResponse>, AppError> {
    info!(user_id = %user.id, "Listing PATs");
    let pats = state.pats.list_pats(&user.id).await?;

    Ok(Json(ListPatsResponse {
        pats: pats.into_iter().map(Into::into).collect(),
    }))
}

pub async fn delete_pat(
    State(state): State<AppState>,
    TrustedUser(user): TrustedUser,
    Json(req): Json<DeletePatRequest>,
) -> Result<Json<DeletePatResponse>, AppError> {
    req.validate()
        .map_err(|msg| AppError::bad_request("INVALID_ARGUMENT", msg))?;

    info!(user_id = %user.id, pat_id = %req.pat_id, "Deleting PAT");
    state.pats.delete_pat(&user.id, req.pat_id.trim()).await?;

    Ok(Json(DeletePatResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::api::v1::test_support::TestApp;

    async fn call(app: &TestApp, method: &str, user: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut req = Request::post(format!("/pat.v1.PATService/{method}"))
            .header("content-type", "application/json");
        if let Some(user) = user {
            req = req
                .header("x-auth-request-user", user)
                .header("x-auth-request-email", "alice@example.com")
                .header("x-auth-request-preferred-username", "alice");
        }
        let res = app
            .router()
            .oneshot(req.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn in_one_day() -> i64 {
        Utc::now().timestamp() + 86_400
    }

    #[tokio::test]
    async fn create_list_delete_round_trip() {
        let app = TestApp::new();
        let exp = in_one_day();

        let (status, created) = call(
            &app,
            "CreatePAT",
            Some("human-1"),
            json!({"expirationDate": exp.to_string()}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["token"], "raw-m-1");
        assert_eq!(created["pat"]["userId"], "human-1");
        assert_eq!(created["pat"]["machineUserId"], "m-1");
        assert_eq!(created["pat"]["expirationDate"], exp);

        let (_, listed) = call(&app, "ListPATs", Some("human-1"), json!({})).await;
        assert_eq!(listed["pats"].as_array().unwrap().len(), 1);

        let pat_id = created["pat"]["id"].as_str().unwrap();
        let (status, deleted) =
            call(&app, "DeletePAT", Some("human-1"), json!({"patId": pat_id})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted, json!({"success": true}));
    }

    #[tokio::test]
    async fn missing_user_header_is_unauthenticated() {
        let app = TestApp::new();

        for method in ["CreatePAT", "ListPATs", "DeletePAT"] {
            let (status, body) = call(&app, method, None, json!({})).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method}");
            assert_eq!(body["error"]["code"], "UNAUTHENTICATED");
        }
    }

    #[tokio::test]
    async fn past_expiration_is_invalid_argument() {
        let app = TestApp::new();

        let (status, body) = call(
            &app,
            "CreatePAT",
            Some("human-1"),
            json!({"expirationDate": Utc::now().timestamp() - 3600}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_EXPIRATION");
        assert_eq!(app.directory.call_count(), 0);
    }

    #[tokio::test]
    async fn list_for_new_user_is_empty() {
        let app = TestApp::new();

        let (status, body) = call(&app, "ListPATs", Some("nobody"), json!({})).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"pats": []}));
    }

    #[tokio::test]
    async fn delete_maps_not_found_cases() {
        let app = TestApp::new();

        let (status, body) = call(&app, "DeletePAT", Some("human-1"), json!({"patId": "p-1"})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "machine user not found.");

        call(
            &app,
            "CreatePAT",
            Some("human-1"),
            json!({"expirationDate": in_one_day()}),
        )
        .await;
        let (status, body) = call(&app, "DeletePAT", Some("human-1"), json!({"patId": "p-9"})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "PAT not found.");

        let (status, _) = call(&app, "DeletePAT", Some("human-1"), json!({"patId": " "})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
