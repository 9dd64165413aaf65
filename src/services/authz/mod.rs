pub mod claims;
pub mod credential;
pub mod decision;
pub mod engine;
pub mod token_cache;

pub use decision::{Decision, HeaderKeys, IdentityHeaders};
pub use engine::{AuthzService, ExchangeStrategy};
pub use token_cache::ValkeyTokenCache;
