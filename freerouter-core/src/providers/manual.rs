//! A single hand-declared model.

use async_trait::async_trait;

use super::{Provider, ProviderKind, normalize_base, optional_key, required_str};
use crate::auth::ApiKey;
use crate::env::ResolvedParams;
use crate::{ModelDescriptor, Result, ServiceEntry};

/// Exactly one model at one endpoint, no discovery.
///
/// ```yaml
/// - type: manual
///   model_name: gpt-4o-mini
///   provider: openai
///   api_base: https://api.openai.com/v1
///   api_key: ${OPENAI_API_KEY}
/// ```
#[derive(Debug, Clone)]
pub struct ManualProvider {
    name: String,
    model_name: String,
    backend: String,
    api_base: Option<String>,
    api_key: Option<ApiKey>,
    request_timeout: Option<u64>,
}

impl ManualProvider {
    pub fn from_params(name: &str, params: &ResolvedParams) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            model_name: required_str(params, name, &["model_name", "model"])?.to_string(),
            backend: required_str(params, name, &["provider", "backend"])?.to_string(),
            api_base: params.str("api_base").map(normalize_base),
            api_key: optional_key(params),
            request_timeout: params.u64("request_timeout"),
        })
    }
}

#[async_trait]
impl Provider for ManualProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Manual
    }

    async fn fetch_models(&self) -> Result<Vec<ModelDescriptor>> {
        Ok(vec![ModelDescriptor::new(&self.model_name)])
    }

    fn format_service(&self, model: &ModelDescriptor) -> ServiceEntry {
        ServiceEntry::new(&self.backend, &model.id)
            .api_base(self.api_base.as_deref())
            .api_key(self.api_key.as_ref().map(ApiKey::expose_secret))
            .timeout(self.request_timeout)
    }
}
