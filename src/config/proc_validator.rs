//! Configuration validation with aggregated errors: every problem is
//! collected into one `Vec<String>` so an operator sees them all at once.

use std::net::IpAddr;

use regex::Regex;
use tracing::{error, info, warn};

use crate::config::provider::{ProviderConfig, ServiceConfig};
use crate::config::settings::{RenewalConfig, RetryConfig, SettingsConfig};
use crate::config::store::{MirrorFormat, StoreConfig};
use crate::utils::constants::{MAX_LEAD_TIME_SECONDS, MAX_TICK_INTERVAL_SECONDS};

pub fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_provider(&cfg.provider, &mut errors);
    validate_store(&cfg.store, &mut errors);

    if errors.is_empty() {
        info!("config validation passed");
        Ok(())
    } else {
        for e in &errors {
            error!("config validation: {}", e);
        }
        Err(errors)
    }
}

fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    validate_renewal(&settings.renewal, errors);
    if let Some(retry) = &settings.retry {
        validate_retry(retry, errors);
    }
    if let Some(logging) = &settings.logging {
        let allowed = ["trace", "debug", "info", "warn", "error"];
        if !allowed.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' must be one of {:?}",
                logging.level, allowed
            ));
        }
    }
    if settings.metrics.is_enabled && !settings.metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            settings.metrics.path
        ));
    }
    if settings.server.is_enabled && settings.server.port.parse::<u16>().is_err() {
        errors.push(format!(
            "settings.server.port '{}' is not a valid port",
            settings.server.port
        ));
    }
    if settings.server.is_enabled && !is_loopback_host(&settings.server.host) {
        warn!(
            "settings.server.host '{}' is not a loopback address; /authorize is unauthenticated and should not be reachable from other hosts",
            settings.server.host
        );
    }
}

/// `localhost` or a loopback IP literal.
pub fn is_loopback_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .map(|ip| ip.is_loopback())
        .unwrap_or(false)
}

fn validate_renewal(renewal: &RenewalConfig, errors: &mut Vec<String>) {
    if renewal.tick_interval_seconds == 0 {
        errors.push("settings.renewal.tick_interval_seconds must be > 0".to_string());
    }
    if renewal.tick_interval_seconds > MAX_TICK_INTERVAL_SECONDS {
        errors.push(format!(
            "settings.renewal.tick_interval_seconds must be <= {}",
            MAX_TICK_INTERVAL_SECONDS
        ));
    }
    if renewal.lead_time_seconds == 0 {
        errors.push("settings.renewal.lead_time_seconds must be > 0".to_string());
    }
    if renewal.lead_time_seconds > MAX_LEAD_TIME_SECONDS {
        errors.push(format!(
            "settings.renewal.lead_time_seconds must be <= {}",
            MAX_LEAD_TIME_SECONDS
        ));
    }
    if renewal.request_timeout_ms == 0 {
        errors.push("settings.renewal.request_timeout_ms must be > 0".to_string());
    }
    if renewal.startup_timeout_ms == 0 {
        errors.push("settings.renewal.startup_timeout_ms must be > 0".to_string());
    }
}

fn validate_retry(retry: &RetryConfig, errors: &mut Vec<String>) {
    if retry.attempts == Some(0) {
        errors.push("settings.retry.attempts must be >= 1".to_string());
    }
    if let (Some(base), Some(max)) = (retry.base_delay_ms, retry.max_delay_ms) {
        if max < base {
            errors.push(format!(
                "settings.retry.max_delay_ms ({}) must be >= base_delay_ms ({})",
                max, base
            ));
        }
    }
}

fn validate_provider(provider: &ProviderConfig, errors: &mut Vec<String>) {
    let required = [
        ("token_url", &provider.token_url),
        ("client_id", &provider.client_id),
        ("client_secret", &provider.client_secret),
        ("redirect_uri", &provider.redirect_uri),
    ];
    for (name, value) in required {
        if value.trim().is_empty() {
            errors.push(format!("provider.{} must not be empty", name));
        }
    }
    if !provider.token_url.trim().is_empty()
        && !(provider.token_url.starts_with("http://") || provider.token_url.starts_with("https://"))
    {
        errors.push(format!(
            "provider.token_url '{}' must be an http(s) URL",
            provider.token_url
        ));
    }
}

fn validate_store(store: &StoreConfig, errors: &mut Vec<String>) {
    if store.path.trim().is_empty() {
        errors.push("store.path must not be empty".to_string());
    }
    if let Some(mirror) = &store.mirror {
        if mirror.path.trim().is_empty() {
            errors.push("store.mirror.path must not be empty".to_string());
        }
        if mirror.path == store.path {
            errors.push("store.mirror.path must differ from store.path".to_string());
        }
        if mirror.format == MirrorFormat::Env {
            if let Some(variable) = &mirror.variable {
                let valid = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
                    .map(|re| re.is_match(variable))
                    .unwrap_or(false);
                if !valid {
                    errors.push(format!(
                        "store.mirror.variable '{}' is not a valid environment variable name",
                        variable
                    ));
                }
            }
        }
    }
}
