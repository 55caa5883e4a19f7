//! Error taxonomy shared by the exchange client, the stores and the manager.
//!
//! Plumbing (config, binary, server start-up) uses `anyhow`; these enums exist
//! where callers branch on the kind of failure.

use thiserror::Error;

/// Failure of a call against the authorization server's token endpoint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Network error, timeout, 5xx or 429. Retryable on the next tick.
    #[error("transient token endpoint failure: {0}")]
    Transient(String),

    /// The grant (refresh token or authorization code) is no longer accepted.
    #[error("invalid grant: {0}")]
    InvalidGrant(String),

    /// 2xx response with an unexpected shape.
    #[error("malformed token response: {0}")]
    Malformed(String),

    /// Any other 4xx, e.g. `invalid_client`.
    #[error("token request rejected with status {status}: {reason}")]
    Rejected { status: u16, reason: String },
}

impl AuthError {
    /// Terminal for the current refresh token; automatic renewal must stop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuthError::InvalidGrant(_))
    }

    /// Worth repeating inside one renewal attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Transient(_))
    }

    /// Short label used for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::Transient(_) => "transient",
            AuthError::InvalidGrant(_) => "invalid_grant",
            AuthError::Malformed(_) => "malformed",
            AuthError::Rejected { .. } => "rejected",
        }
    }
}

/// Persistence failure. Logged by callers; the in-memory record stays usable.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error at '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("stored token record is corrupted: {0}")]
    Corrupted(#[from] serde_json::Error),
}

/// Returned to consumers of `get_valid_token()`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    /// No record was ever obtained; an authorization-code exchange is needed.
    #[error("no token record available, authorization required")]
    NotAuthorized,

    /// The record is expired and could not be renewed.
    #[error("access token expired and renewal is unavailable: {0}")]
    RenewalRequired(String),
}
