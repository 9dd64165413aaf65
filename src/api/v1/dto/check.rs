/*
 * Responsibility
 * - Envoy ext_authz v3 Check の request/response DTO (proto3 JSON 名)
 * - 必要なフィールドのみ (attributes.request.http)
 */
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::services::authz::IdentityHeaders;

/// `google.rpc.Code` values used in `CheckResponse.status`.
pub const RPC_OK: i32 = 0;
pub const RPC_UNAUTHENTICATED: i32 = 16;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CheckRequest {
    pub attributes: AttributeContext,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AttributeContext {
    pub request: RequestContext,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RequestContext {
    pub http: Option<HttpRequest>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HttpRequest {
    pub id: String,
    pub method: String,
    pub path: String,
    pub host: String,
    pub headers: HashMap<String, String>,
}

impl HttpRequest {
    /// `authorization`, then `Authorization`. A present but blank value is
    /// still returned; only absence counts as missing.
    pub fn authorization(&self) -> Option<&str> {
        ["authorization", "Authorization"]
            .iter()
            .find_map(|k| self.headers.get(*k))
            .map(String::as_str)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub status: RpcStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok_response: Option<OkHttpResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denied_response: Option<DeniedHttpResponse>,
}

#[derive(Debug, Serialize)]
pub struct RpcStatus {
    pub code: i32,
}

#[derive(Debug, Serialize)]
pub struct OkHttpResponse {
    pub headers: Vec<HeaderValueOption>,
}

#[derive(Debug, Serialize)]
pub struct HeaderValueOption {
    pub header: HeaderValue,
    pub append: bool,
}

#[derive(Debug, Serialize)]
pub struct HeaderValue {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct DeniedHttpResponse {
    pub status: HttpStatus,
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct HttpStatus {
    pub code: u16,
}

impl CheckResponse {
    pub fn ok(headers: &IdentityHeaders) -> Self {
        let headers = headers
            .iter()
            .map(|(key, value)| HeaderValueOption {
                header: HeaderValue {
                    key: key.to_string(),
                    value: value.to_string(),
                },
                append: false,
            })
            .collect();

        Self {
            status: RpcStatus { code: RPC_OK },
            ok_response: Some(OkHttpResponse { headers }),
            denied_response: None,
        }
    }

    pub fn denied(http_status: u16, body: impl Into<String>) -> Self {
        Self {
            status: RpcStatus {
                code: RPC_UNAUTHENTICATED,
            },
            ok_response: None,
            denied_response: Some(DeniedHttpResponse {
                status: HttpStatus { code: http_status },
                body: body.into(),
            }),
        }
    }
}
