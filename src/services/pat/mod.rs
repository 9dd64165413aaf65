pub mod error;
pub mod service;

pub use error::PatError;
pub use service::{HumanUser, Pat, PatService};
