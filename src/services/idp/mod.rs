//! Identity provider (Zitadel) integration.
pub mod client;
pub mod error;
pub mod retry;
pub mod types;
pub mod zitadel;

pub use client::{
    ExchangeClient, MachineUser, NewMachineUser, PatDirectory, PersonalAccessToken, token_type,
};
pub use error::IdpError;
pub use retry::RetryConfig;
pub use zitadel::{IdpSettings, ZitadelClient};
