pub mod check;
pub mod forward_auth;
pub mod health;
pub mod pats;
