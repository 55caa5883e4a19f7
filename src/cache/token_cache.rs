use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info};

use crate::cache::token_record::TokenRecord;
use crate::observability::metrics::Metrics;
use crate::store::CredentialStore;

/// In-memory copy of the current record, written through to the store.
///
/// Every write goes through [`TokenCache::commit`], which saves first and then
/// swaps the whole record under the write lock, so readers only ever see a
/// complete record.
#[derive(Clone)]
pub struct TokenCache {
    inner: Arc<RwLock<Option<TokenRecord>>>,
    store: Arc<dyn CredentialStore>,
    metrics: Arc<Metrics>,
}

impl TokenCache {
    /// Seed the cache from the persisted record. A store read failure starts
    /// the cache empty; the next commit overwrites whatever is on disk.
    pub async fn restore(store: Arc<dyn CredentialStore>, metrics: Arc<Metrics>) -> Self {
        let record = match store.load().await {
            Ok(Some(record)) => {
                info!(
                    "restored token record for owner '{}', expires at {}",
                    record.owner_id,
                    record.expires_at()
                );
                metrics.token_expiry_unix.set(record.expires_at().timestamp());
                Some(record)
            }
            Ok(None) => None,
            Err(err) => {
                error!("failed to load token record, starting without one: {}", err);
                metrics.persistence_failures.inc();
                None
            }
        };

        Self {
            inner: Arc::new(RwLock::new(record)),
            store,
            metrics,
        }
    }

    pub async fn get(&self) -> Option<TokenRecord> {
        self.inner.read().await.clone()
    }

    /// Replace the record. Returns `false` when the store rejected the write;
    /// the cache is updated regardless and serves with degraded durability.
    pub async fn commit(&self, record: TokenRecord) -> bool {
        let persisted = match self.store.save(&record).await {
            Ok(()) => true,
            Err(err) => {
                error!("persisting token record failed, continuing in memory: {}", err);
                self.metrics.persistence_failures.inc();
                false
            }
        };

        self.metrics.token_expiry_unix.set(record.expires_at().timestamp());
        *self.inner.write().await = Some(record);
        persisted
    }
}
