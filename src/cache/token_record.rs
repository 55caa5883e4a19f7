use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Full authentication state for one external account.
///
/// A renewal replaces the whole record; nothing mutates a record in place.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub scope: String,
    pub owner_id: String,
    pub issued_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl TokenRecord {
    pub fn new(
        access_token: String,
        refresh_token: String,
        token_type: String,
        scope: String,
        owner_id: String,
        issued_at: DateTime<Utc>,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type,
            scope,
            owner_id,
            issued_at,
            ttl_seconds,
        }
    }

    /// End of the validity window `[issued_at, issued_at + ttl_seconds)`.
    /// Saturates at the latest representable instant.
    pub fn expires_at(&self) -> DateTime<Utc> {
        i64::try_from(self.ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| self.issued_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Issue time for a record replacing `self`; always strictly later.
    pub fn next_issued_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let floor = self
            .issued_at
            .checked_add_signed(Duration::milliseconds(1))
            .unwrap_or(self.issued_at);
        if now < floor {
            floor
        } else {
            now
        }
    }
}

// token values never reach logs
impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("owner_id", &self.owner_id)
            .field("issued_at", &self.issued_at)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(ttl_seconds: u64) -> TokenRecord {
        TokenRecord::new(
            "A1".into(),
            "R1".into(),
            DEFAULT_TOKEN_TYPE.into(),
            "".into(),
            "owner".into(),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            ttl_seconds,
        )
    }

    #[test]
    fn expires_at_adds_ttl() {
        let record = record(3600);
        assert_eq!(record.expires_at(), record.issued_at + Duration::hours(1));
    }

    #[test]
    fn huge_ttl_saturates_instead_of_overflowing() {
        for ttl in [100_000_000_000_000_000, i64::MAX as u64, u64::MAX] {
            assert_eq!(record(ttl).expires_at(), DateTime::<Utc>::MAX_UTC);
        }
    }

    #[test]
    fn debug_output_hides_tokens() {
        let rendered = format!("{:?}", record(60));
        assert!(!rendered.contains("A1"));
        assert!(!rendered.contains("R1"));
    }
}
