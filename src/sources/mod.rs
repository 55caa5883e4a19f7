//! Calls against the external authorization server.

pub mod oauth2;

use async_trait::async_trait;

use crate::cache::token_record::TokenRecord;
use crate::error::AuthError;

pub use oauth2::OAuth2ExchangeClient;

/// Both grants of the token endpoint. Every call is bounded by a timeout.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// One-shot: an authorization code is single-use and is never retried.
    async fn exchange_authorization_code(&self, code: &str) -> Result<TokenRecord, AuthError>;

    /// Trade `record.refresh_token` for a brand-new record.
    async fn refresh(&self, record: &TokenRecord) -> Result<TokenRecord, AuthError>;
}
