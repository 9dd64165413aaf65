//! Wire shapes of the Zitadel v2 user and PAT APIs.
//!
//! Only the fields this service reads or writes are modelled. Dates travel as
//! RFC3339 strings; empty strings and nulls decode as absent.
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const USER_TYPE_MACHINE: &str = "TYPE_MACHINE";
pub const TEXT_QUERY_METHOD_EQUALS: &str = "TEXT_QUERY_METHOD_EQUALS";

#[derive(Debug, Serialize)]
pub struct ListUsersRequest {
    pub query: ListQuery,
    pub queries: Vec<SearchQuery>,
}

#[derive(Debug, Serialize)]
pub struct ListQuery {
    pub limit: u32,
}

/// One-of search query; exactly one field is set.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name_query: Option<UserNameQuery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_query: Option<TypeQuery>,
    #[serde(rename = "organizationIdQuery", skip_serializing_if = "Option::is_none")]
    pub organization_id_query: Option<OrganizationIdQuery>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserNameQuery {
    pub user_name: String,
    pub method: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TypeQuery {
    #[serde(rename = "type")]
    pub user_type: &'static str,
}

#[derive(Debug, Serialize)]
pub struct OrganizationIdQuery {
    #[serde(rename = "organizationId")]
    pub organization_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListUsersResponse {
    pub result: Vec<User>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub machine: Option<MachineDetails>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MachineDetails {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub organization_id: String,
    pub username: String,
    pub machine: CreateMachine,
}

#[derive(Debug, Serialize)]
pub struct CreateMachine {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateUserResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPersonalAccessTokenRequest {
    pub user_id: String,
    #[serde(serialize_with = "serialize_rfc3339")]
    pub expiration_date: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AddPersonalAccessTokenResponse {
    #[serde(deserialize_with = "deserialize_optional_rfc3339")]
    pub creation_date: Option<DateTime<Utc>>,
    pub token_id: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ListPersonalAccessTokensRequest {
    pub pagination: Pagination,
    pub filters: Vec<PersonalAccessTokenFilter>,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub limit: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalAccessTokenFilter {
    pub user_id_filter: IdFilter,
}

#[derive(Debug, Serialize)]
pub struct IdFilter {
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListPersonalAccessTokensResponse {
    pub result: Vec<PersonalAccessTokenEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersonalAccessTokenEntry {
    pub id: String,
    pub user_id: String,
    #[serde(deserialize_with = "deserialize_optional_rfc3339")]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "deserialize_optional_rfc3339")]
    pub expiration_date: Option<DateTime<Utc>>,
}

fn serialize_rfc3339<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn deserialize_optional_rfc3339<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
    }
}
