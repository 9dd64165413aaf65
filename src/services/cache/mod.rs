pub mod client;
pub mod valkey;

pub use client::{CacheClient, CacheError, CacheProbe};
pub use valkey::ValkeyClient;
