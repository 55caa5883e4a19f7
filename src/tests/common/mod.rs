// tests/common/mod.rs
pub use axum::Router;
pub use tokio::task::JoinHandle;

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use reqwest::Client;

use crate::cache::token_record::TokenRecord;
use crate::error::AuthError;
use crate::helpers::time::now;
use crate::observability::metrics::Metrics;
use crate::resilience::retry::RetrySettings;
use crate::scheduler::renewal::RenewalSettings;
use crate::sources::TokenExchange;

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

pub fn metrics() -> Arc<Metrics> {
    Metrics::new().expect("metrics registry")
}

/// Lead window 30 minutes, no background ticks during a test, no retries.
pub fn test_settings() -> RenewalSettings {
    RenewalSettings {
        tick_interval: Duration::from_secs(3600),
        lead_time: ChronoDuration::seconds(1800),
        startup_timeout: Duration::from_secs(2),
        retry: RetrySettings::single(),
    }
}

/// Record issued now that expires in `expires_in` seconds.
pub fn record_expiring_in(label: &str, expires_in: u64) -> TokenRecord {
    TokenRecord::new(
        format!("access-{label}"),
        format!("refresh-{label}"),
        "Bearer".into(),
        "read".into(),
        "owner-1".into(),
        now(),
        expires_in,
    )
}

/// Record whose validity window closed a minute ago.
pub fn expired_record(label: &str) -> TokenRecord {
    TokenRecord::new(
        format!("access-{label}"),
        format!("refresh-{label}"),
        "Bearer".into(),
        "read".into(),
        "owner-1".into(),
        now() - ChronoDuration::seconds(120),
        60,
    )
}

/// Token endpoint stand-in.
///
/// Refresh calls pop the next scripted failure; once the script is empty every
/// refresh rotates both tokens (`access-N` / `refresh-N`). Every refresh token
/// presented is recorded so tests can check rotation.
pub struct ScriptedExchange {
    failures: Mutex<VecDeque<AuthError>>,
    code_failures: Mutex<VecDeque<AuthError>>,
    seen_refresh_tokens: Mutex<Vec<String>>,
    refresh_calls: AtomicUsize,
    code_calls: AtomicUsize,
    issued: AtomicUsize,
    refresh_ttl: AtomicU64,
    code_ttl: AtomicU64,
    delay: Duration,
}

impl ScriptedExchange {
    pub fn new() -> Self {
        Self {
            failures: Mutex::new(VecDeque::new()),
            code_failures: Mutex::new(VecDeque::new()),
            seen_refresh_tokens: Mutex::new(Vec::new()),
            refresh_calls: AtomicUsize::new(0),
            code_calls: AtomicUsize::new(0),
            issued: AtomicUsize::new(0),
            refresh_ttl: AtomicU64::new(3600),
            code_ttl: AtomicU64::new(3600),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_refresh_ttl(self, ttl_seconds: u64) -> Self {
        self.refresh_ttl.store(ttl_seconds, Ordering::SeqCst);
        self
    }

    pub fn with_code_ttl(self, ttl_seconds: u64) -> Self {
        self.code_ttl.store(ttl_seconds, Ordering::SeqCst);
        self
    }

    pub fn fail_next_refresh(&self, err: AuthError) {
        self.failures.lock().unwrap().push_back(err);
    }

    pub fn fail_next_code(&self, err: AuthError) {
        self.code_failures.lock().unwrap().push_back(err);
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn code_calls(&self) -> usize {
        self.code_calls.load(Ordering::SeqCst)
    }

    pub fn seen_refresh_tokens(&self) -> Vec<String> {
        self.seen_refresh_tokens.lock().unwrap().clone()
    }

    fn issue(&self, ttl_seconds: u64, previous: Option<&TokenRecord>) -> TokenRecord {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let issued_at = match previous {
            Some(previous) => previous.next_issued_at(now()),
            None => now(),
        };
        TokenRecord::new(
            format!("access-{n}"),
            format!("refresh-{n}"),
            "Bearer".into(),
            "read".into(),
            "owner-1".into(),
            issued_at,
            ttl_seconds,
        )
    }
}

#[async_trait]
impl TokenExchange for ScriptedExchange {
    async fn exchange_authorization_code(&self, _code: &str) -> Result<TokenRecord, AuthError> {
        self.code_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let scripted = self.code_failures.lock().unwrap().pop_front();
        match scripted {
            Some(err) => Err(err),
            None => Ok(self.issue(self.code_ttl.load(Ordering::SeqCst), None)),
        }
    }

    async fn refresh(&self, record: &TokenRecord) -> Result<TokenRecord, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_refresh_tokens
            .lock()
            .unwrap()
            .push(record.refresh_token.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let scripted = self.failures.lock().unwrap().pop_front();
        match scripted {
            Some(err) => Err(err),
            None => Ok(self.issue(self.refresh_ttl.load(Ordering::SeqCst), Some(record))),
        }
    }
}
