pub mod client;
pub mod moka;
pub mod valkey;

pub use client::{CacheClient, CacheError};
pub use self::moka::MokaClient;
pub use valkey::ValkeyClient;
