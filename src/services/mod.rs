pub mod authz;
pub mod cache;
pub mod factory;
pub mod idp;
pub mod pat;
