//! Zitadel-backed implementation of the IdP traits.
//!
//! One `reqwest::Client` (and therefore one connection pool) is shared by every
//! request task. Each call is retried per `RetryConfig`; the client-level
//! timeout bounds every single attempt.
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};
use url::Url;

use crate::services::idp::client::{
    MachineUser, MachineUserManager, NewMachineUser, PatManager, PersonalAccessToken,
    TokenExchanger, TokenResponse, UserInfo, UserInfoGetter, token_type,
};
use crate::services::idp::error::IdpError;
use crate::services::idp::retry::{RetryConfig, retry_with_backoff, retry_with_backoff_if};
use crate::services::idp::types::{
    AddPersonalAccessTokenRequest, AddPersonalAccessTokenResponse, CreateMachine,
    CreateUserRequest, CreateUserResponse, IdFilter, ListPersonalAccessTokensRequest,
    ListPersonalAccessTokensResponse, ListQuery, ListUsersRequest, ListUsersResponse,
    OrganizationIdQuery, Pagination, PersonalAccessTokenFilter, SearchQuery,
    TEXT_QUERY_METHOD_EQUALS, TypeQuery, USER_TYPE_MACHINE, UserNameQuery,
};

const TOKEN_EXCHANGE_GRANT: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
const PAT_SEARCH_LIMIT: u32 = 100;

/// Connection settings for the IdP.
#[derive(Debug, Clone)]
pub struct IdpSettings {
    pub issuer: String,
    pub client_id: String,
    pub client_secret: String,
    pub organization_id: String,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

#[derive(Clone)]
pub struct ZitadelClient {
    http: reqwest::Client,
    issuer: Url,
    client_id: String,
    client_secret: String,
    organization_id: String,
    retry: RetryConfig,
}

impl std::fmt::Debug for ZitadelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZitadelClient")
            .field("issuer", &self.issuer.as_str())
            .field("client_id", &self.client_id)
            .field("organization_id", &self.organization_id)
            .finish_non_exhaustive()
    }
}

impl ZitadelClient {
    pub fn new(settings: IdpSettings) -> Result<Self, IdpError> {
        let issuer = Url::parse(settings.issuer.trim_end_matches('/'))
            .map_err(|e| IdpError::invalid_response("parse issuer", e.to_string()))?;
        if issuer.cannot_be_a_base() {
            return Err(IdpError::invalid_response(
                "parse issuer",
                "issuer must be an http(s) base url",
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|source| IdpError::Transport {
                operation: "build http client",
                source,
            })?;

        Ok(Self {
            http,
            issuer,
            client_id: settings.client_id,
            client_secret: settings.client_secret,
            organization_id: settings.organization_id,
            retry: settings.retry,
        })
    }

    /// Issuer URL with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.issuer.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Runs the request built by `build` under the retry policy and returns
    /// the body of a successful response.
    async fn call<F>(&self, operation: &'static str, build: F) -> Result<String, IdpError>
    where
        F: Fn() -> RequestBuilder,
    {
        retry_with_backoff(&self.retry, operation, || execute(operation, build())).await
    }

    /// `call` for requests that must not run twice (they create something):
    /// only attempts that failed to connect are repeated.
    async fn call_creating<F>(&self, operation: &'static str, build: F) -> Result<String, IdpError>
    where
        F: Fn() -> RequestBuilder,
    {
        retry_with_backoff_if(&self.retry, operation, IdpError::is_connect, || {
            execute(operation, build())
        })
        .await
    }

    async fn token_request(
        &self,
        operation: &'static str,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, IdpError> {
        let url = self.endpoint(&["oauth", "v2", "token"]);
        let body = self
            .call(operation, || {
                self.http
                    .post(url.clone())
                    .basic_auth(&self.client_id, Some(&self.client_secret))
                    .form(form)
            })
            .await?;

        decode(operation, &body)
    }
}

async fn execute(operation: &'static str, request: RequestBuilder) -> Result<String, IdpError> {
    let response = request
        .send()
        .await
        .map_err(|source| IdpError::Transport { operation, source })?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| IdpError::Transport { operation, source })?;

    if status.is_client_error() || status.is_server_error() {
        return Err(IdpError::status(operation, status.as_u16(), &body));
    }

    debug!(operation, status = status.as_u16(), "IdP call succeeded");
    Ok(body)
}

fn decode<T: DeserializeOwned>(operation: &'static str, body: &str) -> Result<T, IdpError> {
    serde_json::from_str(body).map_err(|e| IdpError::Decode {
        operation,
        message: e.to_string(),
    })
}

#[async_trait]
impl TokenExchanger for ZitadelClient {
    async fn exchange(&self, subject_token: &str) -> Result<TokenResponse, IdpError> {
        let form = [
            ("grant_type", TOKEN_EXCHANGE_GRANT),
            ("subject_token", subject_token),
            ("subject_token_type", token_type::ACCESS_TOKEN),
            ("requested_token_type", token_type::ACCESS_TOKEN),
            ("scope", "openid"),
            ("audience", self.client_id.as_str()),
        ];

        self.token_request("token exchange", &form)
            .await
            .inspect_err(|e| error!(error = %e, "Token exchange failed"))
    }

    async fn exchange_with_actor(
        &self,
        subject: &str,
        subject_token_type: &str,
        actor_token: &str,
    ) -> Result<TokenResponse, IdpError> {
        let form = [
            ("grant_type", TOKEN_EXCHANGE_GRANT),
            ("subject_token", subject),
            ("subject_token_type", subject_token_type),
            ("actor_token", actor_token),
            ("actor_token_type", token_type::ACCESS_TOKEN),
            ("requested_token_type", token_type::JWT),
            ("scope", "openid"),
            ("audience", self.client_id.as_str()),
        ];

        self.token_request("token exchange with actor", &form)
            .await
            .inspect_err(|e| error!(subject, error = %e, "Token exchange with actor failed"))
    }
}

#[async_trait]
impl UserInfoGetter for ZitadelClient {
    async fn get_user_info(&self, credential: &str) -> Result<UserInfo, IdpError> {
        const OP: &str = "get userinfo";
        let url = self.endpoint(&["oidc", "v1", "userinfo"]);

        let body = self
            .call(OP, || self.http.get(url.clone()).bearer_auth(credential))
            .await
            .inspect_err(|e| error!(error = %e, "Get userinfo failed"))?;

        decode(OP, &body)
    }
}

#[async_trait]
impl MachineUserManager for ZitadelClient {
    async fn get_machine_user_by_username(
        &self,
        admin_token: &str,
        username: &str,
    ) -> Result<Option<MachineUser>, IdpError> {
        const OP: &str = "search machine user";
        let url = self.endpoint(&["v2", "users"]);
        let request = ListUsersRequest {
            query: ListQuery { limit: 1 },
            queries: vec![
                SearchQuery {
                    user_name_query: Some(UserNameQuery {
                        user_name: username.to_string(),
                        method: TEXT_QUERY_METHOD_EQUALS,
                    }),
                    ..Default::default()
                },
                SearchQuery {
                    type_query: Some(TypeQuery {
                        user_type: USER_TYPE_MACHINE,
                    }),
                    ..Default::default()
                },
                SearchQuery {
                    organization_id_query: Some(OrganizationIdQuery {
                        organization_id: self.organization_id.clone(),
                    }),
                    ..Default::default()
                },
            ],
        };

        let body = match self
            .call(OP, || {
                self.http
                    .post(url.clone())
                    .bearer_auth(admin_token)
                    .json(&request)
            })
            .await
        {
            Ok(body) => body,
            Err(e) if e.is_not_found() => {
                debug!(username, "Machine user not found");
                return Ok(None);
            }
            Err(e) => {
                error!(username, error = %e, "Search machine user failed");
                return Err(e);
            }
        };

        let response: ListUsersResponse = decode(OP, &body)?;
        let Some(user) = response.result.into_iter().next() else {
            debug!(username, "Machine user not found (empty result)");
            return Ok(None);
        };

        if user.user_id.is_empty() {
            return Err(IdpError::invalid_response(OP, "user without id"));
        }
        let Some(machine) = user.machine else {
            warn!(username, "Search returned a non-machine user");
            return Err(IdpError::invalid_response(
                OP,
                format!("user {username} is not a machine user"),
            ));
        };

        Ok(Some(MachineUser {
            id: user.user_id,
            username: user.username,
            name: machine.name,
            description: machine.description,
        }))
    }

    async fn create_machine_user(
        &self,
        admin_token: &str,
        user: &NewMachineUser,
    ) -> Result<MachineUser, IdpError> {
        const OP: &str = "create machine user";
        let url = self.endpoint(&["v2", "users", "new"]);
        let request = CreateUserRequest {
            organization_id: self.organization_id.clone(),
            username: user.username.clone(),
            machine: CreateMachine {
                name: user.name.clone(),
                description: user.description.clone(),
            },
        };

        let body = self
            .call_creating(OP, || {
                self.http
                    .post(url.clone())
                    .bearer_auth(admin_token)
                    .json(&request)
            })
            .await
            .inspect_err(|e| {
                if e.is_conflict() {
                    warn!(username = %user.username, "Machine user already exists");
                } else {
                    error!(username = %user.username, error = %e, "Create machine user failed");
                }
            })?;

        let response: CreateUserResponse = decode(OP, &body)?;
        if response.id.is_empty() {
            return Err(IdpError::invalid_response(OP, "empty user id"));
        }

        Ok(MachineUser {
            id: response.id,
            username: user.username.clone(),
            name: user.name.clone(),
            description: user.description.clone(),
        })
    }
}

#[async_trait]
impl PatManager for ZitadelClient {
    async fn add_personal_access_token(
        &self,
        admin_token: &str,
        user_id: &str,
        expiration_date: DateTime<Utc>,
    ) -> Result<(PersonalAccessToken, String), IdpError> {
        const OP: &str = "add personal access token";
        let url = self.endpoint(&["v2", "users", user_id, "pats"]);
        let request = AddPersonalAccessTokenRequest {
            user_id: user_id.to_string(),
            expiration_date,
        };

        let body = self
            .call_creating(OP, || {
                self.http
                    .post(url.clone())
                    .bearer_auth(admin_token)
                    .json(&request)
            })
            .await
            .inspect_err(|e| error!(user_id, error = %e, "Add personal access token failed"))?;

        let response: AddPersonalAccessTokenResponse = decode(OP, &body)?;
        if response.token.is_empty() {
            return Err(IdpError::invalid_response(OP, "empty token"));
        }
        if response.token_id.is_empty() {
            warn!(user_id, "Add personal access token returned no token id");
        }

        let pat = PersonalAccessToken {
            id: response.token_id,
            user_id: user_id.to_string(),
            expiration_date: Some(expiration_date),
            created_at: response.creation_date,
        };
        Ok((pat, response.token))
    }

    async fn list_personal_access_tokens(
        &self,
        admin_token: &str,
        user_id: &str,
    ) -> Result<Vec<PersonalAccessToken>, IdpError> {
        const OP: &str = "list personal access tokens";
        let url = self.endpoint(&["v2", "users", "pats", "search"]);
        let request = ListPersonalAccessTokensRequest {
            pagination: Pagination {
                limit: PAT_SEARCH_LIMIT,
            },
            filters: vec![PersonalAccessTokenFilter {
                user_id_filter: IdFilter {
                    id: user_id.to_string(),
                },
            }],
        };

        let body = self
            .call(OP, || {
                self.http
                    .post(url.clone())
                    .bearer_auth(admin_token)
                    .json(&request)
            })
            .await
            .inspect_err(|e| error!(user_id, error = %e, "List personal access tokens failed"))?;

        let response: ListPersonalAccessTokensResponse = decode(OP, &body)?;
        let pats = response
            .result
            .into_iter()
            .map(|entry| PersonalAccessToken {
                id: entry.id,
                user_id: if entry.user_id.is_empty() {
                    user_id.to_string()
                } else {
                    entry.user_id
                },
                expiration_date: entry.expiration_date,
                created_at: entry.creation_date,
            })
            .collect();

        Ok(pats)
    }

    async fn remove_personal_access_token(
        &self,
        admin_token: &str,
        user_id: &str,
        pat_id: &str,
    ) -> Result<(), IdpError> {
        const OP: &str = "remove personal access token";
        let url = self.endpoint(&["v2", "users", user_id, "pats", pat_id]);

        self.call(OP, || self.http.delete(url.clone()).bearer_auth(admin_token))
            .await
            .inspect_err(|e| {
                error!(user_id, pat_id, error = %e, "Remove personal access token failed")
            })?;

        Ok(())
    }
}
