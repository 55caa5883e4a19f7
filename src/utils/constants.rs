//! Shared constants and invariants

pub const DEFAULT_TICK_INTERVAL_SECONDS: u64 = 5 * 60;
pub const DEFAULT_LEAD_TIME_SECONDS: u64 = crate::cache::token_clock::DEFAULT_LEAD_TIME_SECONDS;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_STARTUP_TIMEOUT_MS: u64 = 15_000;

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 2;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 200;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 1000;

// Upper bounds; anything larger is treated as a bad value
pub const MAX_TOKEN_TTL_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;
pub const MAX_LEAD_TIME_SECONDS: u64 = MAX_TOKEN_TTL_SECONDS;
pub const MAX_TICK_INTERVAL_SECONDS: u64 = 24 * 60 * 60;

// OAuth2 grant types
pub const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";
pub const GRANT_REFRESH_TOKEN: &str = "refresh_token";
pub const ERROR_INVALID_GRANT: &str = "invalid_grant";
