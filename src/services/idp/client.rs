//! Identity provider contract.
//!
//! The authorization engine and the PAT manager only see these traits. The
//! concrete HTTP client lives in `zitadel.rs`; tests substitute in-memory fakes.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::services::idp::error::IdpError;

/// Token types used in the token-exchange grant.
pub mod token_type {
    pub const ACCESS_TOKEN: &str = "urn:ietf:params:oauth:token-type:access_token";
    pub const JWT: &str = "urn:ietf:params:oauth:token-type:jwt";
    pub const USER_ID: &str = "urn:zitadel:params:oauth:token-type:user_id";
}

/// Token endpoint response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub issued_token_type: Option<String>,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
}

/// Standard OIDC user-info response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserInfo {
    pub sub: String,
    pub preferred_username: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineUser {
    pub id: String,
    pub username: String,
    pub name: String,
    pub description: String,
}

/// Attributes of a machine user to be created.
#[derive(Debug, Clone)]
pub struct NewMachineUser {
    pub username: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalAccessToken {
    pub id: String,
    pub user_id: String,
    pub expiration_date: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Subject-only exchange: the credential itself is the subject token.
    async fn exchange(&self, subject_token: &str) -> Result<TokenResponse, IdpError>;

    /// Exchange on behalf of `subject`, authorized by `actor_token`.
    async fn exchange_with_actor(
        &self,
        subject: &str,
        subject_token_type: &str,
        actor_token: &str,
    ) -> Result<TokenResponse, IdpError>;
}

#[async_trait]
pub trait UserInfoGetter: Send + Sync {
    async fn get_user_info(&self, credential: &str) -> Result<UserInfo, IdpError>;
}

#[async_trait]
pub trait MachineUserManager: Send + Sync {
    /// `Ok(None)` when no machine user with that username exists.
    async fn get_machine_user_by_username(
        &self,
        admin_token: &str,
        username: &str,
    ) -> Result<Option<MachineUser>, IdpError>;

    /// A 409 from the IdP surfaces as `IdpError::Status` (`is_conflict()`).
    async fn create_machine_user(
        &self,
        admin_token: &str,
        user: &NewMachineUser,
    ) -> Result<MachineUser, IdpError>;
}

#[async_trait]
pub trait PatManager: Send + Sync {
    /// Returns the token metadata and the raw token, which is only visible here.
    async fn add_personal_access_token(
        &self,
        admin_token: &str,
        user_id: &str,
        expiration_date: DateTime<Utc>,
    ) -> Result<(PersonalAccessToken, String), IdpError>;

    async fn list_personal_access_tokens(
        &self,
        admin_token: &str,
        user_id: &str,
    ) -> Result<Vec<PersonalAccessToken>, IdpError>;

    async fn remove_personal_access_token(
        &self,
        admin_token: &str,
        user_id: &str,
        pat_id: &str,
    ) -> Result<(), IdpError>;
}

/// What the authorization engine needs from the IdP.
pub trait ExchangeClient: TokenExchanger + UserInfoGetter {}

impl<T: TokenExchanger + UserInfoGetter + ?Sized> ExchangeClient for T {}

/// What the PAT manager needs from the IdP.
pub trait PatDirectory: MachineUserManager + PatManager {}

impl<T: MachineUserManager + PatManager + ?Sized> PatDirectory for T {}
