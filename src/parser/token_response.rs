//! Turns a token endpoint reply into a [`TokenRecord`] or a classified
//! [`AuthError`].
//!
//! Success shape: `{access_token, refresh_token, expires_in, token_type, scope}`
//! plus an optional `user_id` / `owner_id`. Error shape:
//! `{error, error_description}`.

use chrono::{DateTime, Utc};
use http::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::cache::token_record::{TokenRecord, DEFAULT_TOKEN_TYPE};
use crate::error::AuthError;
use crate::utils::constants::{ERROR_INVALID_GRANT, MAX_TOKEN_TTL_SECONDS};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<Value>,
    token_type: Option<String>,
    scope: Option<String>,
    user_id: Option<Value>,
    owner_id: Option<Value>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
}

/// Values the response may omit.
#[derive(Debug, Clone, Copy)]
pub struct ResponseContext<'a> {
    pub previous: Option<&'a TokenRecord>,
    pub configured_owner: Option<&'a str>,
    pub now: DateTime<Utc>,
}

pub fn parse_token_response(
    status: StatusCode,
    body: &str,
    ctx: ResponseContext<'_>,
) -> Result<TokenRecord, AuthError> {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return Err(AuthError::Transient(format!("token endpoint answered {}", status)));
    }
    if status.is_client_error() {
        return Err(classify_client_error(status, body));
    }
    if !status.is_success() {
        return Err(AuthError::Transient(format!("unexpected status {}", status)));
    }

    let response: TokenResponse = serde_json::from_str(body)
        .map_err(|e| AuthError::Malformed(format!("response is not a token document: {}", e)))?;

    if let Some(error) = response.error.as_deref() {
        if response.access_token.is_none() {
            let description = response.error_description.clone().unwrap_or_default();
            return Err(error_from_code(status, error, &description));
        }
    }

    let access_token = non_empty(response.access_token, "access_token")?;
    let refresh_token = non_empty(response.refresh_token, "refresh_token")?;
    let ttl_seconds = parse_expires_in(response.expires_in.as_ref())?;

    let owner_id = response
        .user_id
        .as_ref()
        .or(response.owner_id.as_ref())
        .and_then(value_to_string)
        .or_else(|| ctx.previous.map(|p| p.owner_id.clone()))
        .or_else(|| ctx.configured_owner.map(str::to_owned))
        .unwrap_or_default();

    let scope = response
        .scope
        .or_else(|| ctx.previous.map(|p| p.scope.clone()))
        .unwrap_or_default();

    let token_type = response
        .token_type
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_owned());

    let issued_at = ctx
        .previous
        .map(|p| p.next_issued_at(ctx.now))
        .unwrap_or(ctx.now);

    Ok(TokenRecord::new(
        access_token,
        refresh_token,
        token_type,
        scope,
        owner_id,
        issued_at,
        ttl_seconds,
    ))
}

fn classify_client_error(status: StatusCode, body: &str) -> AuthError {
    let parsed: ErrorResponse = serde_json::from_str(body).unwrap_or_default();
    let description = parsed
        .error_description
        .or(parsed.message)
        .unwrap_or_default();
    match parsed.error {
        Some(code) => error_from_code(status, &code, &description),
        None => AuthError::Rejected {
            status: status.as_u16(),
            reason: truncate(body, 200),
        },
    }
}

fn error_from_code(status: StatusCode, code: &str, description: &str) -> AuthError {
    let reason = if description.is_empty() {
        code.to_owned()
    } else {
        format!("{}: {}", code, description)
    };
    if code == ERROR_INVALID_GRANT {
        AuthError::InvalidGrant(reason)
    } else {
        AuthError::Rejected {
            status: status.as_u16(),
            reason,
        }
    }
}

fn non_empty(value: Option<String>, field: &str) -> Result<String, AuthError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AuthError::Malformed(format!("missing '{}'", field)))
}

fn parse_expires_in(value: Option<&Value>) -> Result<u64, AuthError> {
    let seconds = match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    match seconds {
        Some(s) if s > MAX_TOKEN_TTL_SECONDS => Err(AuthError::Malformed(format!(
            "'expires_in' of {}s exceeds {}s",
            s, MAX_TOKEN_TTL_SECONDS
        ))),
        Some(s) if s > 0 => Ok(s),
        _ => Err(AuthError::Malformed(format!("invalid 'expires_in': {:?}", value))),
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn truncate(body: &str, max: usize) -> String {
    body.chars().take(max).collect()
}
