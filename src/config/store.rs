use serde::Deserialize;

pub const DEFAULT_MIRROR_VARIABLE: &str = "ACCESS_TOKEN";

/// ================================
/// Credential store
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// JSON file holding the current token record.
    pub path: String,
    /// Optional read-only copy of the access token for operators.
    pub mirror: Option<MirrorConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MirrorConfig {
    pub path: String,
    #[serde(default)]
    pub format: MirrorFormat,
    /// Variable name for `format: env`.
    pub variable: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MirrorFormat {
    /// Token value only.
    #[default]
    Raw,
    /// `NAME=value` line inside an env file; other lines are preserved.
    Env,
}
