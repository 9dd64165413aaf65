/*
 * Responsibility
 * - PATService (CreatePAT / ListPATs / DeletePAT) の request/response DTO
 * - validation (形式チェック) 用の validate()
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::pat::Pat;

/// int64 in proto3 JSON may arrive as a number or a decimal string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum EpochSeconds {
    Number(i64),
    Text(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreatePatRequest {
    pub expiration_date: Option<EpochSeconds>,
}

impl CreatePatRequest {
    /// Parses the expiration; whether it lies in the future is checked by the service.
    pub fn validate(&self) -> Result<DateTime<Utc>, &'static str> {
        let secs = match &self.expiration_date {
            None => return Err("expirationDate is required"),
            Some(EpochSeconds::Number(n)) => *n,
            Some(EpochSeconds::Text(s)) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| "expirationDate must be epoch seconds")?,
        };

        DateTime::from_timestamp(secs, 0).ok_or("expirationDate is out of range")
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeletePatRequest {
    pub pat_id: String,
}

impl DeletePatRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.pat_id.trim().is_empty() {
            return Err("patId is required");
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatResponse {
    pub id: String,
    pub user_id: String,
    pub machine_user_id: String,
    // Epoch seconds; 0 when the IdP did not report it.
    pub expiration_date: i64,
    pub created_at: i64,
}

impl From<Pat> for PatResponse {
    fn from(pat: Pat) -> Self {
        Self {
            id: pat.id,
            user_id: pat.human_user_id,
            machine_user_id: pat.machine_user_id,
            expiration_date: pat.expiration_date.map_or(0, |d| d.timestamp()),
            created_at: pat.created_at.map_or(0, |d| d.timestamp()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatePatResponse {
    pub pat: PatResponse,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ListPatsResponse {
    pub pats: Vec<PatResponse>,
}

#[derive(Debug, Serialize)]
pub struct DeletePatResponse {
    pub success: bool,
}
