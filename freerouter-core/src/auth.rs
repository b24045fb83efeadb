//! Credentials: provider API keys and the proxy master key.

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};
use uuid::Uuid;

use crate::env::{EnvSource, resolve_optional};

/// Environment variable consulted for the proxy master key.
pub const MASTER_KEY_ENV: &str = "LITELLM_MASTER_KEY";

/// A provider API key that never shows up in logs.
///
/// The key is wrapped in `SecretString`, so `Debug` is redacted and the
/// value is only reachable through [`expose_secret`](ApiKey::expose_secret).
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(SecretString::from(key.into()))
    }

    /// Expose the key value.
    ///
    /// Only for request headers and the generated proxy config.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey([REDACTED])")
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Where the master key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterKeySource {
    Settings,
    Environment,
    Generated,
}

/// Pick the proxy master key.
///
/// Order: the `master_key` setting (placeholders allowed), then
/// `LITELLM_MASTER_KEY`, then a freshly generated ephemeral key.
pub fn resolve_master_key(
    configured: Option<&str>,
    env: &dyn EnvSource,
) -> (String, MasterKeySource) {
    if let Some(key) = configured.and_then(|raw| resolve_optional(raw, env)) {
        debug!("Using master key from settings");
        return (key, MasterKeySource::Settings);
    }

    if let Some(key) = env.get(MASTER_KEY_ENV).filter(|k| !k.trim().is_empty()) {
        debug!("Using master key from {}", MASTER_KEY_ENV);
        return (key, MasterKeySource::Environment);
    }

    let key = generate_master_key();
    info!(
        prefix = &key[..7],
        "Generated ephemeral master key (set {} to pin one)", MASTER_KEY_ENV
    );
    (key, MasterKeySource::Generated)
}

/// `sk-` followed by 64 random hex characters.
pub fn generate_master_key() -> String {
    format!(
        "sk-{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}
