use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::token_cache::TokenCache;
use crate::cache::token_clock::{lead_time_from_seconds, TokenClock};
use crate::cache::token_record::TokenRecord;
use crate::config::settings::SettingsConfig;
use crate::error::AuthError;
use crate::helpers::time::{get_instant, now};
use crate::observability::metrics::Metrics;
use crate::resilience::retry::RetrySettings;
use crate::sources::TokenExchange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalState {
    Idle,
    Checking,
    Renewing,
    /// Refresh token rejected; only a new authorization code leaves this state.
    Faulted,
}

impl RenewalState {
    fn as_gauge(self) -> i64 {
        match self {
            RenewalState::Idle => 0,
            RenewalState::Checking => 1,
            RenewalState::Renewing => 2,
            RenewalState::Faulted => 3,
        }
    }
}

/// What caused a renewal attempt; used as the metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalTrigger {
    Scheduled,
    OnDemand,
    Forced,
    Startup,
}

impl RenewalTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenewalTrigger::Scheduled => "scheduled",
            RenewalTrigger::OnDemand => "on_demand",
            RenewalTrigger::Forced => "forced",
            RenewalTrigger::Startup => "startup",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewalOutcome {
    Renewed(TokenRecord),
    /// Old record kept; the next tick tries again.
    Failed(AuthError),
    /// Refresh token rejected; automatic renewal halted.
    Faulted(AuthError),
    /// Nothing to renew, or renewal already halted.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    NoRecord,
    NotDue,
    Renewed,
    Failed,
    Faulted,
    /// A renewal was already in flight.
    Busy,
    /// Scheduler is faulted; tick ignored.
    Halted,
}

/// Timing knobs of the renewal loop.
#[derive(Debug, Clone)]
pub struct RenewalSettings {
    pub tick_interval: Duration,
    pub lead_time: ChronoDuration,
    pub startup_timeout: Duration,
    pub retry: RetrySettings,
}

impl RenewalSettings {
    pub fn from_settings(settings: &SettingsConfig) -> Self {
        Self {
            tick_interval: Duration::from_secs(settings.renewal.tick_interval_seconds),
            lead_time: lead_time_from_seconds(settings.renewal.lead_time_seconds),
            startup_timeout: Duration::from_millis(settings.renewal.startup_timeout_ms),
            retry: RetrySettings::from(settings.retry.as_ref()),
        }
    }
}

impl Default for RenewalSettings {
    fn default() -> Self {
        Self::from_settings(&SettingsConfig::default())
    }
}

/// Decides when to renew and performs renewals.
///
/// Every renewal, scheduled or requested by the manager, runs while holding
/// `gate`, so at most one refresh grant is ever in flight and a rotating
/// refresh token is consumed once.
pub struct RenewalScheduler {
    cache: TokenCache,
    exchange: Arc<dyn TokenExchange>,
    metrics: Arc<Metrics>,
    settings: RenewalSettings,
    state: RwLock<RenewalState>,
    last_error: RwLock<Option<AuthError>>,
    gate: Mutex<()>,
    attempts: AtomicU64,
}

impl RenewalScheduler {
    pub fn new(
        cache: TokenCache,
        exchange: Arc<dyn TokenExchange>,
        metrics: Arc<Metrics>,
        settings: RenewalSettings,
    ) -> Self {
        metrics.scheduler_state.set(RenewalState::Idle.as_gauge());
        Self {
            cache,
            exchange,
            metrics,
            settings,
            state: RwLock::new(RenewalState::Idle),
            last_error: RwLock::new(None),
            gate: Mutex::new(()),
            attempts: AtomicU64::new(0),
        }
    }

    pub async fn state(&self) -> RenewalState {
        *self.state.read().await
    }

    pub async fn last_error(&self) -> Option<AuthError> {
        self.last_error.read().await.clone()
    }

    /// Completed renewal attempts, successful or not.
    pub fn attempt_count(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn is_expiring_soon(&self, record: &TokenRecord) -> bool {
        TokenClock::is_expiring_soon(record, now(), self.settings.lead_time)
    }

    /// Wait for exclusive renewal rights.
    pub(crate) async fn lock_gate(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    async fn set_state(&self, state: RenewalState) {
        *self.state.write().await = state;
        self.metrics.scheduler_state.set(state.as_gauge());
    }

    /// One scheduler step. Never waits for an in-flight renewal.
    pub async fn tick(&self) -> TickOutcome {
        let guard = match self.gate.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("renewal already in flight, tick skipped");
                return TickOutcome::Busy;
            }
        };

        if self.state().await == RenewalState::Faulted {
            debug!("scheduler faulted, waiting for a new authorization code");
            return TickOutcome::Halted;
        }

        self.set_state(RenewalState::Checking).await;
        let record = match self.cache.get().await {
            Some(record) => record,
            None => {
                debug!("no token record yet, nothing to renew");
                self.set_state(RenewalState::Idle).await;
                return TickOutcome::NoRecord;
            }
        };

        if !self.is_expiring_soon(&record) {
            debug!(
                "token valid for {}s more, no renewal needed",
                TokenClock::time_until_expiry(&record, now()).num_seconds()
            );
            self.set_state(RenewalState::Idle).await;
            return TickOutcome::NotDue;
        }

        match self.renew_locked(&guard, record, RenewalTrigger::Scheduled).await {
            RenewalOutcome::Renewed(_) => TickOutcome::Renewed,
            RenewalOutcome::Failed(_) => TickOutcome::Failed,
            RenewalOutcome::Faulted(_) => TickOutcome::Faulted,
            RenewalOutcome::Skipped => TickOutcome::Halted,
        }
    }

    /// Acquire the gate and renew whatever record is current, regardless of
    /// lead time.
    pub async fn renew_now(&self, trigger: RenewalTrigger) -> RenewalOutcome {
        let guard = self.gate.lock().await;
        if self.state().await == RenewalState::Faulted {
            return RenewalOutcome::Skipped;
        }
        match self.cache.get().await {
            Some(record) => self.renew_locked(&guard, record, trigger).await,
            None => RenewalOutcome::Skipped,
        }
    }

    /// Refresh `record` and commit the result. The guard proves the caller
    /// owns the gate.
    pub(crate) async fn renew_locked(
        &self,
        _gate: &MutexGuard<'_, ()>,
        record: TokenRecord,
        trigger: RenewalTrigger,
    ) -> RenewalOutcome {
        self.set_state(RenewalState::Renewing).await;
        self.metrics.renewal_attempts.with_label_values(&[trigger.as_str()]).inc();
        info!(
            "renewing token for owner '{}' ({}), expires at {}",
            record.owner_id,
            trigger.as_str(),
            record.expires_at()
        );

        let start = get_instant();
        let exchange = self.exchange.as_ref();
        let result = self
            .settings
            .retry
            .run_with_retry(|| exchange.refresh(&record), AuthError::is_retryable)
            .await;
        let elapsed = start.elapsed().as_secs_f64();

        let outcome = match result {
            Ok(new_record) => {
                self.cache.commit(new_record.clone()).await;
                *self.last_error.write().await = None;
                self.set_state(RenewalState::Idle).await;
                self.metrics.renewal_duration.with_label_values(&["renewed"]).observe(elapsed);
                info!(
                    "token renewed for owner '{}', valid until {}",
                    new_record.owner_id,
                    new_record.expires_at()
                );
                RenewalOutcome::Renewed(new_record)
            }
            Err(err) if err.is_terminal() => {
                error!("refresh token rejected, automatic renewal halted: {}", err);
                self.record_failure(&err, elapsed).await;
                self.set_state(RenewalState::Faulted).await;
                RenewalOutcome::Faulted(err)
            }
            Err(err) => {
                match &err {
                    AuthError::Rejected { .. } => error!("token renewal rejected, keeping current token: {}", err),
                    _ => warn!("token renewal failed, keeping current token: {}", err),
                }
                self.record_failure(&err, elapsed).await;
                self.set_state(RenewalState::Idle).await;
                RenewalOutcome::Failed(err)
            }
        };

        self.attempts.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    async fn record_failure(&self, err: &AuthError, elapsed: f64) {
        self.metrics.renewal_failures.with_label_values(&[err.reason()]).inc();
        self.metrics.renewal_duration.with_label_values(&["failed"]).observe(elapsed);
        *self.last_error.write().await = Some(err.clone());
    }

    /// Commit a record obtained from a fresh authorization code and leave
    /// the faulted state.
    pub(crate) async fn install_locked(&self, _gate: &MutexGuard<'_, ()>, record: TokenRecord) {
        self.cache.commit(record).await;
        *self.last_error.write().await = None;
        if self.state().await == RenewalState::Faulted {
            info!("new authorization installed, automatic renewal resumed");
        }
        self.set_state(RenewalState::Idle).await;
    }

    /// Run `tick` every `tick_interval` until the returned handle is stopped.
    /// The first tick fires one interval after spawning.
    pub fn spawn(self: Arc<Self>) -> SchedulerHandle {
        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let cadence = self.settings.tick_interval;

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + cadence, cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("renewal scheduler started, tick every {:?}", cadence);
            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        // a started tick always runs to completion
                        let outcome = self.tick().await;
                        debug!("tick outcome: {:?}", outcome);
                    }
                }
            }
            info!("renewal scheduler stopped");
        });

        SchedulerHandle {
            cancel,
            task: Some(task),
        }
    }
}

/// Owner of the background renewal task.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop future ticks and wait for the task (and any tick in progress) to
    /// finish. The interval timer is dropped with the task.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                error!("renewal scheduler task ended abnormally: {}", err);
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
