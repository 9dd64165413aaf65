pub mod trusted_user;

pub use trusted_user::TrustedUser;
