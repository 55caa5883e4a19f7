//! Durable storage of the single current [`TokenRecord`].

pub mod file_store;
pub mod memory_store;

use async_trait::async_trait;

use crate::cache::token_record::TokenRecord;
use crate::error::StoreError;

pub use file_store::FileCredentialStore;
pub use memory_store::MemoryCredentialStore;

/// Pluggable persistence backend: a local file, a secrets manager, a database
/// row. Implementations must make `save` all-or-nothing.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` on first run.
    async fn load(&self) -> Result<Option<TokenRecord>, StoreError>;

    async fn save(&self, record: &TokenRecord) -> Result<(), StoreError>;
}
