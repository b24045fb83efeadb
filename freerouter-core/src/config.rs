//! Provider declaration file (`providers.yaml`).

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::warn;

use crate::env::EnvSource;
use crate::{Error, Result};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_PROXY_COMMAND: &str = "litellm";

/// Environment overrides applied on top of the file.
pub const PORT_ENV: &str = "LITELLM_PORT";
pub const HOST_ENV: &str = "LITELLM_HOST";

/// One entry of the `providers` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Variant tag, looked up in the provider registry.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Variant-specific parameters (`api_key`, `api_base`, `models`, ...).
    #[serde(flatten)]
    pub params: BTreeMap<String, Value>,
}

impl ProviderConfig {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            enabled: true,
            name: None,
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Name used in logs and reports.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.kind)
    }
}

/// What to do when two providers produce the same routable name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Later declaration wins; each overwrite is logged.
    #[default]
    Warn,
    /// Any collision fails the run.
    Strict,
}

/// The optional top-level `settings` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_key: Option<String>,
    /// Seconds allowed for each provider's discovery call.
    pub fetch_timeout: u64,
    /// Seconds the proxy waits on an upstream completion.
    pub request_timeout: Option<u64>,
    pub num_retries: u32,
    pub routing_strategy: String,
    pub on_duplicate: CollisionPolicy,
    pub concurrent: bool,
    pub proxy_command: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            master_key: None,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT_SECS,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
            num_retries: 2,
            routing_strategy: "simple-shuffle".to_string(),
            on_duplicate: CollisionPolicy::Warn,
            concurrent: true,
            proxy_command: DEFAULT_PROXY_COMMAND.to_string(),
        }
    }
}

impl Settings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout.max(1))
    }

    /// Apply `LITELLM_PORT` / `LITELLM_HOST`. A malformed port is ignored
    /// with a warning.
    pub fn apply_env_overrides(&mut self, env: &dyn EnvSource) {
        if let Some(port) = env.get(PORT_ENV) {
            match port.trim().parse() {
                Ok(port) => self.port = port,
                Err(_) => warn!("Ignoring {}={:?}: not a valid port", PORT_ENV, port),
            }
        }
        if let Some(host) = env.get(HOST_ENV).filter(|h| !h.trim().is_empty()) {
            self.host = host.trim().to_string();
        }
    }

    /// URL a local client should use to reach the proxy.
    pub fn service_url(&self) -> String {
        let host = if self.host == "0.0.0.0" {
            "localhost"
        } else {
            &self.host
        };
        format!("http://{}:{}", host, self.port)
    }
}

/// A parsed `providers.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Declarations {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl Declarations {
    pub fn from_yaml(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let decls: Self = serde_yaml::from_str(contents)?;
        for (index, provider) in decls.providers.iter().enumerate() {
            if provider.kind.trim().is_empty() {
                return Err(Error::InvalidConfiguration(format!(
                    "provider #{} has an empty `type`",
                    index + 1
                )));
            }
        }
        Ok(decls)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn enabled(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter().filter(|p| p.enabled)
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const SAMPLE: &str = r#"
settings:
  port: 4100
  on_duplicate: strict
providers:
  - type: openrouter
    api_key: ${OPENROUTER_API_KEY}
  - type: ollama
    enabled: false
  - type: static
    name: lab
    backend: test-backend
    models: [m1, m2]
"#;

    #[test]
    fn parses_declarations_with_defaults() {
        let decls = Declarations::from_yaml(SAMPLE).unwrap();
        assert_eq!(decls.settings.port, 4100);
        assert_eq!(decls.settings.host, DEFAULT_HOST);
        assert_eq!(decls.settings.on_duplicate, CollisionPolicy::Strict);
        assert_eq!(decls.providers.len(), 3);
        assert!(decls.providers[0].enabled);
        assert!(!decls.providers[1].enabled);
        assert_eq!(decls.providers[2].label(), "lab");
        assert_eq!(decls.enabled().count(), 2);
        assert!(decls.providers[2].params.contains_key("models"));
        assert!(!decls.providers[2].params.contains_key("type"));
    }

    #[test]
    fn empty_file_is_empty_declarations() {
        let decls = Declarations::from_yaml("   \n").unwrap();
        assert!(decls.providers.is_empty());
        assert_eq!(decls.settings, Settings::default());
    }

    #[test]
    fn missing_type_is_an_error() {
        let err = Declarations::from_yaml("providers:\n  - api_key: x\n").unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));

        let err = Declarations::from_yaml("providers:\n  - type: ''\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn env_overrides_port_and_host() {
        let env = HashMap::from([
            (PORT_ENV.to_string(), "4242".to_string()),
            (HOST_ENV.to_string(), "127.0.0.1".to_string()),
        ]);
        let mut settings = Settings::default();
        settings.apply_env_overrides(&env);
        assert_eq!(settings.port, 4242);
        assert_eq!(settings.service_url(), "http://127.0.0.1:4242");
    }

    #[test]
    fn bad_port_override_is_ignored() {
        let env = HashMap::from([(PORT_ENV.to_string(), "many".to_string())]);
        let mut settings = Settings::default();
        settings.apply_env_overrides(&env);
        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(settings.service_url(), "http://localhost:4000");
    }
}
