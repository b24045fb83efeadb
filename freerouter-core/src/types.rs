//! Core types for model discovery and the generated proxy config.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Capability tags a discovered model may carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Accepts text input.
    pub text: bool,
    /// Accepts image input.
    pub vision: bool,
    /// Accepts more than one input modality.
    pub multimodal: bool,
}

impl Capabilities {
    /// Capabilities of a plain text model.
    pub fn text() -> Self {
        Self {
            text: true,
            ..Default::default()
        }
    }

    /// Derive capabilities from a list of input modality names
    /// (`"text"`, `"image"`, `"audio"`, ...).
    pub fn from_modalities<S: AsRef<str>>(modalities: &[S]) -> Self {
        let mut caps = Self::default();
        for modality in modalities {
            match modality.as_ref() {
                "text" => caps.text = true,
                "image" => caps.vision = true,
                _ => {}
            }
        }
        caps.multimodal = modalities.len() > 1;
        if modalities.is_empty() {
            caps.text = true;
        }
        caps
    }

    /// Parse a single capability tag into a filter.
    pub fn parse_tag(tag: &str) -> Option<Self> {
        let mut caps = Self::default();
        match tag.trim().to_ascii_lowercase().as_str() {
            "text" => caps.text = true,
            "vision" => caps.vision = true,
            "multimodal" => caps.multimodal = true,
            _ => return None,
        }
        Some(caps)
    }

    /// Check whether every capability set in `filter` is also set here.
    pub fn matches(&self, filter: &Capabilities) -> bool {
        (!filter.text || self.text)
            && (!filter.vision || self.vision)
            && (!filter.multimodal || self.multimodal)
    }
}

/// Per-token pricing as reported by a catalog endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub prompt: f64,
    pub completion: f64,
}

impl Pricing {
    /// Both prompt and completion cost nothing.
    pub fn is_free(&self) -> bool {
        self.prompt == 0.0 && self.completion == 0.0
    }
}

/// One model as reported by a provider's discovery step.
///
/// # Examples
///
/// ```
/// use freerouter_core::{Capabilities, ModelDescriptor};
///
/// let model = ModelDescriptor::new("llama3:8b").capabilities(Capabilities::text());
/// assert_eq!(model.id, "llama3:8b");
/// assert!(model.capabilities.text);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub capabilities: Capabilities,
    pub pricing: Option<Pricing>,
    /// Provider-specific extras (owner, context length, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ModelDescriptor {
    /// A text model with no pricing or metadata.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            capabilities: Capabilities::text(),
            pricing: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = Some(pricing);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Free-tier model: `:free` id suffix, or zero prompt and completion price.
    pub fn is_free(&self) -> bool {
        self.id.ends_with(":free") || self.pricing.is_some_and(|p| p.is_free())
    }
}

/// Backend parameters the proxy uses to reach one model.
///
/// Field names are the proxy's wire contract and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendParams {
    /// `<backend>/<upstream model id>`.
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// One routable entry in the generated `model_list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub model_name: String,
    pub litellm_params: BackendParams,
}

impl ServiceEntry {
    /// Build an entry routed as `model_id` through `backend`.
    pub fn new(backend: &str, model_id: &str) -> Self {
        Self {
            model_name: model_id.to_string(),
            litellm_params: BackendParams {
                model: format!("{backend}/{model_id}"),
                api_base: None,
                api_key: None,
                timeout: None,
            },
        }
    }

    pub fn api_base(mut self, api_base: Option<&str>) -> Self {
        self.litellm_params.api_base = api_base.map(str::to_string);
        self
    }

    pub fn api_key(mut self, api_key: Option<&str>) -> Self {
        self.litellm_params.api_key = api_key.map(str::to_string);
        self
    }

    pub fn timeout(mut self, timeout: Option<u64>) -> Self {
        self.litellm_params.timeout = timeout;
        self
    }

    /// Backend identifier: the prefix of `litellm_params.model`.
    pub fn backend(&self) -> &str {
        match self.litellm_params.model.split_once('/') {
            Some((backend, _)) => backend,
            None => "unknown",
        }
    }
}

impl fmt::Display for ServiceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.model_name, self.litellm_params.model)
    }
}

/// Global proxy behavior block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LitellmSettings {
    pub drop_params: bool,
    pub set_verbose: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_key: Option<String>,
}

impl Default for LitellmSettings {
    fn default() -> Self {
        Self {
            drop_params: true,
            set_verbose: false,
            request_timeout: None,
            master_key: None,
        }
    }
}

/// Router behavior block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterSettings {
    pub routing_strategy: String,
    pub num_retries: u32,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            routing_strategy: "simple-shuffle".to_string(),
            num_retries: 2,
        }
    }
}

/// The complete generated proxy configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDocument {
    #[serde(default)]
    pub model_list: Vec<ServiceEntry>,
    #[serde(default)]
    pub litellm_settings: LitellmSettings,
    #[serde(default)]
    pub router_settings: RouterSettings,
}

impl OutputDocument {
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Read a previously written document.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Routable names grouped by backend identifier, sorted by backend.
    pub fn by_backend(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for entry in &self.model_list {
            groups
                .entry(entry.backend())
                .or_default()
                .push(entry.model_name.as_str());
        }
        groups
    }
}
