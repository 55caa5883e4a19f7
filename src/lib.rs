//! # OAuth Token Agent
//!
//! Keeps one OAuth2 authorization-code / refresh-token grant alive: tracks
//! expiry, renews ahead of time through a single serialized renewal path,
//! persists the record across restarts and hands a valid access token to
//! integration adapters.
//!
//! Modules:
//! - `cache` — token record, expiry arithmetic, in-memory cache
//! - `store` — pluggable durable storage for the record
//! - `sources` — token endpoint client (authorization-code and refresh grants)
//! - `parser` — token endpoint response parsing and error classification
//! - `scheduler` — background renewal state machine
//! - `manager` — `TokenManager` façade used by adapters
//! - `server` — HTTP inspection endpoints

pub mod cache;
pub mod config;
pub mod error;
pub mod helpers;
pub mod manager;
pub mod observability;
pub mod parser;
pub mod resilience;
pub mod scheduler;
pub mod server;
pub mod sinks;
pub mod sources;
pub mod store;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::cache::token_record::TokenRecord;
pub use crate::config::provider::ServiceConfig;
pub use crate::error::{AuthError, StoreError, TokenError};
pub use crate::manager::token_manager::{TokenManager, TokenStatus};
pub use crate::store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use crate::sources::{OAuth2ExchangeClient, TokenExchange};
