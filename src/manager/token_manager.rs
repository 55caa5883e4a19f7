use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::cache::token_cache::TokenCache;
use crate::cache::token_clock::TokenClock;
use crate::cache::token_record::TokenRecord;
use crate::error::{AuthError, TokenError};
use crate::helpers::time::now;
use crate::observability::metrics::Metrics;
use crate::scheduler::renewal::{
    RenewalOutcome, RenewalScheduler, RenewalSettings, RenewalState, RenewalTrigger,
    SchedulerHandle,
};
use crate::sources::TokenExchange;
use crate::store::CredentialStore;

/// Read-only diagnostic snapshot. Never contains token values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenStatus {
    pub has_token: bool,
    pub owner_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Seconds left; negative once expired.
    pub time_remaining_seconds: Option<i64>,
    pub needs_renewal: bool,
    pub state: RenewalState,
    pub last_renewal_error: Option<String>,
}

/// Handle given to integration adapters. Cloning is cheap; all clones share
/// one cache and one scheduler.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    cache: TokenCache,
    exchange: Arc<dyn TokenExchange>,
    scheduler: Arc<RenewalScheduler>,
    metrics: Arc<Metrics>,
    handle: Mutex<Option<SchedulerHandle>>,
}

impl TokenManager {
    /// Load the persisted record, renew it first if it is already inside the
    /// lead window, then start the background scheduler.
    ///
    /// The startup renewal is bounded by `startup_timeout`. If it does not
    /// finish in time it keeps running in the background (a refresh grant is
    /// never abandoned mid-flight) and the manager starts with the last-known
    /// record, which is only served while it has not expired.
    pub async fn start(
        settings: RenewalSettings,
        store: Arc<dyn CredentialStore>,
        exchange: Arc<dyn TokenExchange>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let cache = TokenCache::restore(store, metrics.clone()).await;
        let startup_timeout = settings.startup_timeout;
        let scheduler = Arc::new(RenewalScheduler::new(
            cache.clone(),
            exchange.clone(),
            metrics.clone(),
            settings,
        ));

        let needs_startup_renewal = match cache.get().await {
            Some(record) => scheduler.is_expiring_soon(&record),
            None => false,
        };
        if needs_startup_renewal {
            info!("stored token is inside the lead window, renewing before serving");
            let startup = {
                let scheduler = scheduler.clone();
                tokio::spawn(async move { scheduler.renew_now(RenewalTrigger::Startup).await })
            };
            match timeout(startup_timeout, startup).await {
                Ok(Ok(RenewalOutcome::Renewed(_))) => info!("startup renewal completed"),
                Ok(Ok(outcome)) => warn!("startup renewal did not produce a new token: {:?}", outcome),
                Ok(Err(err)) => warn!("startup renewal task failed: {}", err),
                Err(_) => warn!(
                    "startup renewal still running after {:?}, continuing with the stored token",
                    startup_timeout
                ),
            }
        }

        let handle = scheduler.clone().spawn();
        metrics.up.set(1);

        Self {
            inner: Arc::new(ManagerInner {
                cache,
                exchange,
                scheduler,
                metrics,
                handle: Mutex::new(Some(handle)),
            }),
        }
    }

    /// Access token for an outbound request.
    ///
    /// Hot path returns the cached token without I/O. Inside the lead window
    /// one synchronous renewal is attempted; concurrent callers wait for it
    /// instead of starting their own. On failure the current token is served
    /// while it is still valid.
    pub async fn get_valid_token(&self) -> Result<String, TokenError> {
        let record = self.inner.cache.get().await.ok_or(TokenError::NotAuthorized)?;
        let scheduler = &self.inner.scheduler;
        if !scheduler.is_expiring_soon(&record) {
            return Ok(record.access_token);
        }
        if scheduler.state().await == RenewalState::Faulted {
            return self.serve_unexpired(record).await;
        }

        let observed_attempts = scheduler.attempt_count();
        let gate = scheduler.lock_gate().await;

        let current = self.inner.cache.get().await.ok_or(TokenError::NotAuthorized)?;
        if !scheduler.is_expiring_soon(&current) {
            debug!("token renewed by a concurrent caller");
            return Ok(current.access_token);
        }
        if scheduler.attempt_count() != observed_attempts
            || scheduler.state().await == RenewalState::Faulted
        {
            drop(gate);
            debug!("concurrent renewal attempt failed, not repeating it");
            return self.serve_unexpired(current).await;
        }

        let outcome = scheduler
            .renew_locked(&gate, current.clone(), RenewalTrigger::OnDemand)
            .await;
        match outcome {
            RenewalOutcome::Renewed(new_record) => Ok(new_record.access_token),
            _ => {
                drop(gate);
                self.serve_unexpired(current).await
            }
        }
    }

    /// One renewal regardless of the lead window, for adapters that got a 401
    /// with a token believed valid. Serialized with every other renewal; if
    /// another renewal completed while waiting, its token is returned.
    pub async fn force_renewal(&self) -> Result<String, TokenError> {
        let observed = self.inner.cache.get().await.ok_or(TokenError::NotAuthorized)?;
        let scheduler = &self.inner.scheduler;
        let gate = scheduler.lock_gate().await;

        if scheduler.state().await == RenewalState::Faulted {
            return Err(TokenError::RenewalRequired(self.fault_reason().await));
        }
        let current = self.inner.cache.get().await.ok_or(TokenError::NotAuthorized)?;
        if current.access_token != observed.access_token {
            return Ok(current.access_token);
        }

        match scheduler.renew_locked(&gate, current, RenewalTrigger::Forced).await {
            RenewalOutcome::Renewed(new_record) => Ok(new_record.access_token),
            RenewalOutcome::Failed(err) | RenewalOutcome::Faulted(err) => {
                Err(TokenError::RenewalRequired(err.to_string()))
            }
            RenewalOutcome::Skipped => Err(TokenError::RenewalRequired("renewal skipped".to_owned())),
        }
    }

    /// Exchange a consent code for a new record, replacing any current one.
    /// Resets a faulted scheduler. The code is sent exactly once.
    pub async fn authorize(&self, code: &str) -> Result<TokenRecord, AuthError> {
        let scheduler = &self.inner.scheduler;
        let gate = scheduler.lock_gate().await;
        match self.inner.exchange.exchange_authorization_code(code).await {
            Ok(record) => {
                self.inner
                    .metrics
                    .authorization_exchanges
                    .with_label_values(&["success"])
                    .inc();
                info!(
                    "authorization code exchanged for owner '{}', valid until {}",
                    record.owner_id,
                    record.expires_at()
                );
                scheduler.install_locked(&gate, record.clone()).await;
                Ok(record)
            }
            Err(err) => {
                self.inner
                    .metrics
                    .authorization_exchanges
                    .with_label_values(&[err.reason()])
                    .inc();
                warn!("authorization code exchange failed: {}", err);
                Err(err)
            }
        }
    }

    pub async fn get_status(&self) -> TokenStatus {
        let record = self.inner.cache.get().await;
        let scheduler = &self.inner.scheduler;
        let state = scheduler.state().await;
        let last_renewal_error = scheduler.last_error().await.map(|e| e.to_string());

        match record {
            Some(record) => {
                let remaining = TokenClock::time_until_expiry(&record, now());
                TokenStatus {
                    has_token: true,
                    owner_id: Some(record.owner_id.clone()),
                    expires_at: Some(record.expires_at()),
                    time_remaining_seconds: Some(remaining.num_seconds()),
                    needs_renewal: state == RenewalState::Faulted
                        || scheduler.is_expiring_soon(&record),
                    state,
                    last_renewal_error,
                }
            }
            None => TokenStatus {
                has_token: false,
                owner_id: None,
                expires_at: None,
                time_remaining_seconds: None,
                needs_renewal: true,
                state,
                last_renewal_error,
            },
        }
    }

    /// Stop the background scheduler. Idempotent.
    pub async fn shutdown(&self) {
        let handle = self.inner.handle.lock().await.take();
        if let Some(handle) = handle {
            handle.stop().await;
            self.inner.metrics.up.set(0);
        }
    }

    pub fn scheduler(&self) -> &Arc<RenewalScheduler> {
        &self.inner.scheduler
    }

    async fn serve_unexpired(&self, record: TokenRecord) -> Result<String, TokenError> {
        if TokenClock::is_expired(&record, now()) {
            let reason = match self.inner.scheduler.last_error().await {
                Some(err) => err.to_string(),
                None => "token expired".to_owned(),
            };
            Err(TokenError::RenewalRequired(reason))
        } else {
            Ok(record.access_token)
        }
    }

    async fn fault_reason(&self) -> String {
        self.inner
            .scheduler
            .last_error()
            .await
            .map(|e| e.to_string())
            .unwrap_or_else(|| "refresh token rejected".to_owned())
    }
}
