use std::sync::Arc;

use anyhow::Result;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

/// Agent metrics. Owned by the composition root and handed out by `Arc`.
pub struct Metrics {
    pub registry: Registry,

    // Renewal metrics
    pub renewal_attempts: IntCounterVec,
    pub renewal_failures: IntCounterVec,
    pub renewal_duration: HistogramVec,
    pub authorization_exchanges: IntCounterVec,

    // Token metrics
    pub token_expiry_unix: IntGauge,
    pub scheduler_state: IntGauge,

    // Store metrics
    pub persistence_failures: IntCounter,

    // Config/runtime
    pub up: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>> {
        let registry = Registry::new_custom(Some("oauthagent".into()), None)?;

        let metrics = Self {
            renewal_attempts: IntCounterVec::new(Opts::new("renewal_attempts_total", "Refresh grant attempts by trigger"), &["trigger"])?,
            renewal_failures: IntCounterVec::new(Opts::new("renewal_failures_total", "Refresh grant failures by reason"), &["reason"])?,
            renewal_duration: HistogramVec::new(HistogramOpts::new("renewal_duration_seconds", "Refresh grant duration seconds").buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]), &["outcome"])?,
            authorization_exchanges: IntCounterVec::new(Opts::new("authorization_exchanges_total", "Authorization-code exchanges by outcome"), &["outcome"])?,

            token_expiry_unix: IntGauge::new("token_expiry_unix_seconds", "Access token expiry timestamp")?,
            scheduler_state: IntGauge::new("scheduler_state", "0 idle, 1 checking, 2 renewing, 3 faulted")?,

            persistence_failures: IntCounter::new("persistence_failures_total", "Credential store read/write failures")?,

            up: IntGauge::new("up", "1 if service is healthy")?,

            registry,
        };

        let reg = &metrics.registry;
        reg.register(Box::new(metrics.renewal_attempts.clone()))?;
        reg.register(Box::new(metrics.renewal_failures.clone()))?;
        reg.register(Box::new(metrics.renewal_duration.clone()))?;
        reg.register(Box::new(metrics.authorization_exchanges.clone()))?;
        reg.register(Box::new(metrics.token_expiry_unix.clone()))?;
        reg.register(Box::new(metrics.scheduler_state.clone()))?;
        reg.register(Box::new(metrics.persistence_failures.clone()))?;
        reg.register(Box::new(metrics.up.clone()))?;

        Ok(Arc::new(metrics))
    }
}
