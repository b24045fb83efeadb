//! Fixed model list from the declaration.

use async_trait::async_trait;

use super::{Provider, ProviderKind, normalize_base, optional_key, required_str};
use crate::auth::ApiKey;
use crate::env::ResolvedParams;
use crate::{Error, ModelDescriptor, Result, ServiceEntry};

/// Returns the declared `models` list, routed through `backend`.
///
/// ```yaml
/// - type: static
///   backend: test-backend
///   models: [m1, m2]
///   api_base: http://10.0.0.5:8000/v1   # optional
///   api_key: ${LAB_KEY}                 # optional
/// ```
///
/// A single model may be declared with `model_name` instead of `models`,
/// and `provider` is accepted in place of `backend`:
///
/// ```yaml
/// - type: static
///   model_name: test-model
///   provider: openai
///   api_base: https://api.test.com
/// ```
#[derive(Debug, Clone)]
pub struct StaticListProvider {
    name: String,
    backend: String,
    models: Vec<String>,
    api_base: Option<String>,
    api_key: Option<ApiKey>,
    request_timeout: Option<u64>,
}

impl StaticListProvider {
    pub fn new(backend: impl Into<String>, models: Vec<String>) -> Self {
        Self {
            name: "static".to_string(),
            backend: backend.into(),
            models,
            api_base: None,
            api_key: None,
            request_timeout: None,
        }
    }

    pub fn from_params(name: &str, params: &ResolvedParams) -> Result<Self> {
        let backend = required_str(params, name, &["backend", "provider"])?;

        let models = match params.get("models") {
            Some(serde_yaml::Value::Sequence(_)) => params.strings("models").unwrap_or_default(),
            Some(_) => {
                return Err(Error::InvalidConfiguration(format!(
                    "provider `{name}`: `models` must be a list of model names"
                )));
            }
            None => match params.unresolved("models") {
                Some(var) => {
                    return Err(Error::MissingEnvironmentVariable {
                        var: var.to_string(),
                        field: "models".to_string(),
                    });
                }
                None => single_model(params)?,
            },
        };
        let models: Vec<String> = models
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if models.is_empty() {
            return Err(Error::InvalidConfiguration(format!(
                "provider `{name}` declares no models"
            )));
        }

        let mut provider = Self::new(backend, models);
        provider.name = name.to_string();
        provider.api_base = params.str("api_base").map(normalize_base);
        provider.api_key = optional_key(params);
        provider.request_timeout = params.u64("request_timeout");
        Ok(provider)
    }
}

/// The `model_name` form; empty when neither field is present.
fn single_model(params: &ResolvedParams) -> Result<Vec<String>> {
    const FIELDS: [&str; 2] = ["model_name", "model"];
    if let Some(model) = FIELDS.iter().find_map(|f| params.str(f)) {
        return Ok(vec![model.to_string()]);
    }
    match FIELDS
        .iter()
        .find_map(|f| params.unresolved(f).map(|var| (*f, var)))
    {
        Some((field, var)) => Err(Error::MissingEnvironmentVariable {
            var: var.to_string(),
            field: field.to_string(),
        }),
        None => Ok(Vec::new()),
    }
}

#[async_trait]
impl Provider for StaticListProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::StaticList
    }

    async fn fetch_models(&self) -> Result<Vec<ModelDescriptor>> {
        Ok(self.models.iter().map(ModelDescriptor::new).collect())
    }

    fn format_service(&self, model: &ModelDescriptor) -> ServiceEntry {
        ServiceEntry::new(&self.backend, &model.id)
            .api_base(self.api_base.as_deref())
            .api_key(self.api_key.as_ref().map(ApiKey::expose_secret))
            .timeout(self.request_timeout)
    }
}
