use thiserror::Error;

use crate::services::idp::IdpError;

#[derive(Debug, Error)]
pub enum PatError {
    #[error("invalid expiration date: must be in the future")]
    InvalidExpiration,

    #[error("machine user not found")]
    MachineUserNotFound,

    #[error("PAT not found")]
    PatNotFound,

    #[error("identity provider error: {0}")]
    Upstream(#[from] IdpError),

    /// The IdP answered successfully but with something unusable.
    #[error("inconsistent identity provider state: {0}")]
    Inconsistent(String),
}
