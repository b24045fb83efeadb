//! Remote catalog discovery for OpenAI-compatible endpoints.
//!
//! Every preset issues one `GET {api_base}/models` and reads the `data`
//! array of the response.
//!
//! # Example
//!
//! ```ignore
//! use freerouter_core::providers::{ApiDiscoveryProvider, OPENROUTER};
//!
//! let provider = ApiDiscoveryProvider::builder(&OPENROUTER)
//!     .api_key("sk-or-...")
//!     .build();
//! let models = provider.fetch_models().await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{
    BuildContext, ModelFilter, Provider, ProviderKind, normalize_base, optional_key, required_str,
};
use crate::auth::ApiKey;
use crate::env::ResolvedParams;
use crate::{Capabilities, Error, ModelDescriptor, Pricing, Result, ServiceEntry};

/// Fixed facts about one catalog flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    pub tag: &'static str,
    /// `None` means the declaration must supply `api_base`.
    pub api_base: Option<&'static str>,
    /// Prefix written into `litellm_params.model`.
    pub backend: &'static str,
    pub requires_key: bool,
    pub free_only: bool,
}

pub const OPENROUTER: Preset = Preset {
    tag: "openrouter",
    api_base: Some("https://openrouter.ai/api/v1"),
    backend: "openrouter",
    requires_key: true,
    free_only: true,
};

pub const MODELSCOPE: Preset = Preset {
    tag: "modelscope",
    api_base: Some("https://api-inference.modelscope.cn/v1"),
    backend: "openai",
    requires_key: true,
    free_only: false,
};

pub const IFLOW: Preset = Preset {
    tag: "iflow",
    api_base: Some("https://apis.iflow.cn/v1"),
    backend: "openai",
    requires_key: true,
    free_only: false,
};

/// Any OpenAI-compatible server; the declaration names the endpoint.
pub const OAI: Preset = Preset {
    tag: "oai",
    api_base: None,
    backend: "openai",
    requires_key: false,
    free_only: false,
};

// ────────────────────────────────────────────────────────────────────────────
// Catalog response types
// ────────────────────────────────────────────────────────────────────────────

/// Body of `GET /models`.
#[derive(Debug, Deserialize)]
struct CatalogResponse {
    data: Option<Vec<CatalogModel>>,
}

#[derive(Debug, Deserialize)]
struct CatalogModel {
    id: Option<String>,
    #[serde(default)]
    owned_by: Option<String>,
    #[serde(default)]
    context_length: Option<u64>,
    #[serde(default)]
    pricing: Option<CatalogPricing>,
    #[serde(default)]
    architecture: Option<CatalogArchitecture>,
}

/// Prices arrive as strings on some catalogs and numbers on others.
#[derive(Debug, Deserialize)]
struct CatalogPricing {
    #[serde(default)]
    prompt: Option<serde_json::Value>,
    #[serde(default)]
    completion: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CatalogArchitecture {
    #[serde(default)]
    input_modalities: Vec<String>,
}

fn price(value: Option<&serde_json::Value>) -> Option<f64> {
    match value? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl CatalogModel {
    fn into_descriptor(self) -> Option<ModelDescriptor> {
        let id = self.id.filter(|id| !id.trim().is_empty())?;
        let mut model = ModelDescriptor::new(id);

        if let Some(arch) = &self.architecture {
            model = model.capabilities(Capabilities::from_modalities(&arch.input_modalities));
        }
        if let Some(pricing) = &self.pricing
            && let (Some(prompt), Some(completion)) = (
                price(pricing.prompt.as_ref()),
                price(pricing.completion.as_ref()),
            )
        {
            model = model.pricing(Pricing { prompt, completion });
        }
        if let Some(owner) = self.owned_by {
            model = model.metadata("owned_by", owner.into());
        }
        if let Some(context) = self.context_length {
            model = model.metadata("context_length", context.into());
        }
        Some(model)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ApiDiscoveryProvider
// ────────────────────────────────────────────────────────────────────────────

/// Discovers models from a remote, authenticated catalog.
#[derive(Debug)]
pub struct ApiDiscoveryProvider {
    name: String,
    preset: Preset,
    api_base: String,
    api_key: Option<ApiKey>,
    backend: String,
    timeout: Duration,
    request_timeout: Option<u64>,
    filter: ModelFilter,
    client: reqwest::Client,
}

impl ApiDiscoveryProvider {
    /// Start building a provider with preset defaults.
    pub fn builder(preset: &Preset) -> ApiDiscoveryProviderBuilder {
        ApiDiscoveryProviderBuilder::new(preset)
    }

    /// Build from a resolved declaration.
    ///
    /// A referenced-but-unset `api_key` fails here with
    /// [`Error::MissingEnvironmentVariable`]; a key that was simply never
    /// declared fails later, at fetch time, with [`Error::MissingCredential`].
    pub fn from_params(
        preset: &Preset,
        name: &str,
        params: &ResolvedParams,
        ctx: &BuildContext,
    ) -> Result<Self> {
        if preset.requires_key
            && let Some(var) = params.unresolved("api_key")
        {
            return Err(Error::MissingEnvironmentVariable {
                var: var.to_string(),
                field: "api_key".to_string(),
            });
        }

        let api_base = match preset.api_base {
            Some(default) => params.str("api_base").unwrap_or(default).to_string(),
            None => required_str(params, name, &["api_base"])?.to_string(),
        };

        let mut builder = Self::builder(preset)
            .name(name)
            .api_base(api_base)
            .timeout(ctx.timeout_for(params))
            .filter(ModelFilter::from_params(params, preset.free_only)?)
            .client(ctx.client.clone());
        if let Some(key) = optional_key(params) {
            builder = builder.api_key(key.expose_secret());
        }
        if let Some(backend) = params.str("backend") {
            builder = builder.backend(backend);
        }
        if let Some(secs) = params.u64("request_timeout") {
            builder = builder.request_timeout(secs);
        }
        Ok(builder.build())
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.api_base)
    }
}

#[async_trait]
impl Provider for ApiDiscoveryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::ApiDiscovery
    }

    async fn fetch_models(&self) -> Result<Vec<ModelDescriptor>> {
        if self.preset.requires_key && self.api_key.is_none() {
            return Err(Error::MissingCredential {
                provider: self.name.clone(),
            });
        }

        let url = self.models_url();
        debug!(provider = %self.name, %url, "Fetching model catalog");

        let mut request = self.client.get(&url).timeout(self.timeout);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                format!("timed out after {}s", self.timeout.as_secs())
            } else {
                e.to_string()
            };
            Error::unavailable(&self.name, reason)
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::Authentication {
                provider: self.name.clone(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(Error::unavailable(&self.name, format!("HTTP {status}")));
        }

        let body: CatalogResponse = response
            .json()
            .await
            .map_err(|e| Error::unavailable(&self.name, format!("malformed catalog: {e}")))?;
        let data = body
            .data
            .ok_or_else(|| Error::unavailable(&self.name, "response has no `data` array"))?;

        let total = data.len();
        let models: Vec<_> = data
            .into_iter()
            .filter_map(CatalogModel::into_descriptor)
            .collect();
        if models.len() < total {
            warn!(
                provider = %self.name,
                dropped = total - models.len(),
                "Catalog entries without an id were ignored"
            );
        }

        debug!(provider = %self.name, models = models.len(), "Catalog fetched");
        Ok(models)
    }

    fn filter_models(&self, models: Vec<ModelDescriptor>) -> Vec<ModelDescriptor> {
        self.filter.apply(models)
    }

    fn format_service(&self, model: &ModelDescriptor) -> ServiceEntry {
        ServiceEntry::new(&self.backend, &model.id)
            .api_base(Some(&self.api_base))
            .api_key(self.api_key.as_ref().map(ApiKey::expose_secret))
            .timeout(self.request_timeout)
    }
}

/// Builder for [`ApiDiscoveryProvider`].
pub struct ApiDiscoveryProviderBuilder {
    name: String,
    preset: Preset,
    api_base: String,
    api_key: Option<ApiKey>,
    backend: String,
    timeout: Duration,
    request_timeout: Option<u64>,
    filter: Option<ModelFilter>,
    client: Option<reqwest::Client>,
}

impl ApiDiscoveryProviderBuilder {
    fn new(preset: &Preset) -> Self {
        Self {
            name: preset.tag.to_string(),
            preset: *preset,
            api_base: preset.api_base.unwrap_or_default().to_string(),
            api_key: None,
            backend: preset.backend.to_string(),
            timeout: Duration::from_secs(crate::config::DEFAULT_FETCH_TIMEOUT_SECS),
            request_timeout: None,
            filter: None,
            client: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn api_base(mut self, api_base: impl AsRef<str>) -> Self {
        self.api_base = normalize_base(api_base.as_ref());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(ApiKey::new(key));
        self
    }

    pub fn backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout = Some(secs);
        self
    }

    pub fn filter(mut self, filter: ModelFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> ApiDiscoveryProvider {
        ApiDiscoveryProvider {
            name: self.name,
            preset: self.preset,
            api_base: self.api_base,
            api_key: self.api_key,
            backend: self.backend,
            timeout: self.timeout,
            request_timeout: self.request_timeout,
            filter: self
                .filter
                .unwrap_or_else(|| ModelFilter::default().with_free_only(self.preset.free_only)),
            client: self.client.unwrap_or_default(),
        }
    }
}
