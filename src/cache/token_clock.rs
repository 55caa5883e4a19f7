//! Pure expiry arithmetic over a [`TokenRecord`]. No I/O, no clock reads:
//! callers pass `now` explicitly.

use chrono::{DateTime, Duration, Utc};

use crate::cache::token_record::TokenRecord;

/// Renew this long before the access token actually expires.
pub const DEFAULT_LEAD_TIME_SECONDS: u64 = 30 * 60;

pub struct TokenClock;

impl TokenClock {
    pub fn expires_at(record: &TokenRecord) -> DateTime<Utc> {
        record.expires_at()
    }

    /// Negative once the token has expired.
    pub fn time_until_expiry(record: &TokenRecord, now: DateTime<Utc>) -> Duration {
        record.expires_at() - now
    }

    pub fn is_expiring_soon(record: &TokenRecord, now: DateTime<Utc>, lead_time: Duration) -> bool {
        Self::time_until_expiry(record, now) <= lead_time
    }

    pub fn is_expired(record: &TokenRecord, now: DateTime<Utc>) -> bool {
        now >= record.expires_at()
    }
}

/// Saturates at `Duration::MAX`.
pub fn lead_time_from_seconds(seconds: u64) -> Duration {
    i64::try_from(seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}
