use serde::Deserialize;

use crate::config::{settings::SettingsConfig, store::StoreConfig};

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    pub provider: ProviderConfig,
    pub store: StoreConfig,
}

/// ================================
/// Authorization server
/// ================================
#[derive(Deserialize, Clone)]
pub struct ProviderConfig {
    /// token endpoint, both grants are POSTed here
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// account the token belongs to when the server does not report one
    #[serde(default)]
    pub owner_id: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("owner_id", &self.owner_id)
            .finish()
    }
}
