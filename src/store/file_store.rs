use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::cache::token_record::TokenRecord;
use crate::config::store::StoreConfig;
use crate::error::StoreError;
use crate::helpers::file::write_atomic;
use crate::sinks::sink_file::TokenMirror;
use crate::store::CredentialStore;

/// JSON file store with write-then-rename semantics.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
    mirror: Option<TokenMirror>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mirror: None,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            path: PathBuf::from(&config.path),
            mirror: config.mirror.as_ref().map(TokenMirror::new),
        }
    }

    pub fn with_mirror(mut self, mirror: TokenMirror) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn mirror(&self) -> Option<&TokenMirror> {
        self.mirror.as_ref()
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<TokenRecord>, StoreError> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!("no stored token record at '{}'", self.path.display());
                return Ok(None);
            }
            Err(err) => return Err(self.io_error(err)),
        };
        let record: TokenRecord = serde_json::from_slice(&raw)?;
        debug!("loaded token record {:?}", record);
        Ok(Some(record))
    }

    async fn save(&self, record: &TokenRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(record)?;
        write_atomic(&self.path, &bytes)
            .await
            .map_err(|err| self.io_error(err))?;
        debug!("token record saved to '{}'", self.path.display());

        if let Some(mirror) = &self.mirror {
            if let Err(err) = mirror.write(record).await {
                warn!("token mirror '{}' not updated: {}", mirror.path().display(), err);
            }
        }
        Ok(())
    }
}
