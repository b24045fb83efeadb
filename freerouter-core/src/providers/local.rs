//! Local Ollama daemon discovery.
//!
//! Reads the daemon's `/api/tags` listing. No credential is involved, and
//! an unreachable daemon is reported as skipped rather than failed.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{BuildContext, ModelFilter, Provider, ProviderKind, normalize_base};
use crate::env::ResolvedParams;
use crate::{Error, ModelDescriptor, Result, ServiceEntry};

/// Default Ollama API base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

// ────────────────────────────────────────────────────────────────────────────
// Ollama API Response Types
// ────────────────────────────────────────────────────────────────────────────

/// Response from Ollama's `/api/tags` endpoint.
#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    details: Option<TagDetails>,
}

#[derive(Debug, Deserialize)]
struct TagDetails {
    #[serde(default)]
    parameter_size: Option<String>,
    #[serde(default)]
    family: Option<String>,
}

impl TagModel {
    fn into_descriptor(self) -> ModelDescriptor {
        let mut model = ModelDescriptor::new(self.name);
        if let Some(size) = self.size {
            model = model.metadata("size", size.into());
        }
        if let Some(details) = self.details {
            if let Some(params) = details.parameter_size {
                model = model.metadata("parameter_size", params.into());
            }
            if let Some(family) = details.family {
                model = model.metadata("family", family.into());
            }
        }
        model
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LocalDiscoveryProvider
// ────────────────────────────────────────────────────────────────────────────

/// Discovers models served by a local Ollama daemon.
#[derive(Debug)]
pub struct LocalDiscoveryProvider {
    name: String,
    api_base: String,
    backend: String,
    timeout: Duration,
    request_timeout: Option<u64>,
    filter: ModelFilter,
    client: reqwest::Client,
}

impl LocalDiscoveryProvider {
    /// Provider pointed at the default loopback daemon.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl AsRef<str>) -> Self {
        Self {
            name: "ollama".to_string(),
            api_base: normalize_base(base_url.as_ref()),
            backend: "ollama".to_string(),
            timeout: Duration::from_secs(crate::config::DEFAULT_FETCH_TIMEOUT_SECS),
            request_timeout: None,
            filter: ModelFilter::default(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_params(name: &str, params: &ResolvedParams, ctx: &BuildContext) -> Result<Self> {
        let mut provider = Self::with_base_url(params.str("api_base").unwrap_or(DEFAULT_BASE_URL));
        provider.name = name.to_string();
        provider.timeout = ctx.timeout_for(params);
        provider.request_timeout = params.u64("request_timeout");
        provider.filter = ModelFilter::from_params(params, false)?;
        provider.client = ctx.client.clone();
        if let Some(backend) = params.str("backend") {
            provider.backend = backend.to_string();
        }
        Ok(provider)
    }

    pub fn base_url(&self) -> &str {
        &self.api_base
    }
}

impl Default for LocalDiscoveryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for LocalDiscoveryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::LocalDiscovery
    }

    async fn fetch_models(&self) -> Result<Vec<ModelDescriptor>> {
        let url = format!("{}/api/tags", self.api_base);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::unavailable(&self.name, format!("{} not reachable: {e}", self.api_base)))?;

        // The daemon answered, so anything past this point is a failure
        // rather than a skip.
        if !response.status().is_success() {
            return Err(Error::MalformedResponse {
                provider: self.name.clone(),
                reason: format!("Ollama API returned status {}", response.status()),
            });
        }

        let tags: TagsResponse = response.json().await.map_err(|e| Error::MalformedResponse {
            provider: self.name.clone(),
            reason: format!("malformed tag list: {e}"),
        })?;

        debug!(provider = %self.name, models = tags.models.len(), "Local models listed");
        Ok(tags
            .models
            .into_iter()
            .map(TagModel::into_descriptor)
            .collect())
    }

    fn filter_models(&self, models: Vec<ModelDescriptor>) -> Vec<ModelDescriptor> {
        self.filter.apply(models)
    }

    fn format_service(&self, model: &ModelDescriptor) -> ServiceEntry {
        ServiceEntry::new(&self.backend, &model.id)
            .api_base(Some(&self.api_base))
            .timeout(self.request_timeout)
    }

    fn unavailable_is_skip(&self) -> bool {
        true
    }
}
