//! Provider trait and its variants.
//!
//! A [`Provider`] turns one declaration into a list of [`ServiceEntry`]
//! values in three steps: [`fetch_models`](Provider::fetch_models) performs
//! discovery, [`filter_models`](Provider::filter_models) narrows the list,
//! and [`format_service`](Provider::format_service) maps each survivor into
//! the proxy's shape.
//!
//! | variant                     | discovery                         |
//! |-----------------------------|-----------------------------------|
//! | [`ApiDiscoveryProvider`]    | `GET {api_base}/models`, bearer   |
//! | [`LocalDiscoveryProvider`]  | `GET {api_base}/api/tags`         |
//! | [`StaticListProvider`]      | list from the declaration         |
//! | [`ManualProvider`]          | exactly one declared model        |

mod api;
mod local;
mod manual;
mod static_list;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use glob::Pattern;

pub use api::{ApiDiscoveryProvider, IFLOW, MODELSCOPE, OAI, OPENROUTER, Preset};
pub use local::LocalDiscoveryProvider;
pub use manual::ManualProvider;
pub use static_list::StaticListProvider;

use crate::auth::ApiKey;
use crate::env::ResolvedParams;
use crate::{Capabilities, Error, ModelDescriptor, Result, ServiceEntry};

/// The closed set of provider variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    ApiDiscovery,
    LocalDiscovery,
    StaticList,
    Manual,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderKind::ApiDiscovery => "api-discovery",
            ProviderKind::LocalDiscovery => "local-discovery",
            ProviderKind::StaticList => "static-list",
            ProviderKind::Manual => "manual",
        };
        f.write_str(s)
    }
}

/// A source of model availability.
///
/// Instances are built by the factory for a single fetch cycle and then
/// dropped.
///
/// # Example Implementation
///
/// ```ignore
/// use async_trait::async_trait;
/// use freerouter_core::providers::{Provider, ProviderKind};
/// use freerouter_core::{ModelDescriptor, Result, ServiceEntry};
///
/// struct Fixed;
///
/// #[async_trait]
/// impl Provider for Fixed {
///     fn name(&self) -> &str {
///         "fixed"
///     }
///
///     fn kind(&self) -> ProviderKind {
///         ProviderKind::StaticList
///     }
///
///     async fn fetch_models(&self) -> Result<Vec<ModelDescriptor>> {
///         Ok(vec![ModelDescriptor::new("m1")])
///     }
///
///     fn format_service(&self, model: &ModelDescriptor) -> ServiceEntry {
///         ServiceEntry::new("openai", &model.id)
///     }
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Display name used in logs and reports.
    fn name(&self) -> &str;

    fn kind(&self) -> ProviderKind;

    /// Run discovery.
    ///
    /// Network-backed variants bound every call with a timeout and fail
    /// with [`Error::UpstreamUnavailable`], [`Error::MalformedResponse`] or
    /// [`Error::Authentication`].
    async fn fetch_models(&self) -> Result<Vec<ModelDescriptor>>;

    /// Narrow the discovered list. Identity unless overridden.
    fn filter_models(&self, models: Vec<ModelDescriptor>) -> Vec<ModelDescriptor> {
        models
    }

    /// Map one model into a proxy entry. Pure.
    fn format_service(&self, model: &ModelDescriptor) -> ServiceEntry;

    /// Whether an unreachable upstream means "not running, skip" rather
    /// than a failure. Only [`Error::UpstreamUnavailable`] is ever skipped.
    fn unavailable_is_skip(&self) -> bool {
        false
    }
}

/// Shared inputs for constructing providers.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub client: reqwest::Client,
    /// Default per-call discovery timeout.
    pub fetch_timeout: Duration,
}

impl BuildContext {
    pub fn new(fetch_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            fetch_timeout,
        }
    }

    /// Per-provider `timeout` parameter, else the default.
    pub(crate) fn timeout_for(&self, params: &ResolvedParams) -> Duration {
        params
            .u64("timeout")
            .map(Duration::from_secs)
            .unwrap_or(self.fetch_timeout)
    }
}

impl Default for BuildContext {
    fn default() -> Self {
        Self::new(Duration::from_secs(crate::config::DEFAULT_FETCH_TIMEOUT_SECS))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Model filtering
// ────────────────────────────────────────────────────────────────────────────

/// Optional narrowing shared by the discovery variants.
///
/// Parameters: `include` / `exclude` (glob patterns over model ids),
/// `require` (capability tag), `free_only`.
#[derive(Debug, Clone, Default)]
pub struct ModelFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    require: Option<Capabilities>,
    free_only: bool,
}

impl ModelFilter {
    pub fn from_params(params: &ResolvedParams, free_only_default: bool) -> Result<Self> {
        let include = patterns(params, "include")?;
        let exclude = patterns(params, "exclude")?;
        let require = match params.str("require") {
            Some(tag) => Some(Capabilities::parse_tag(tag).ok_or_else(|| {
                Error::InvalidConfiguration(format!(
                    "unknown capability `{tag}` (expected text, vision or multimodal)"
                ))
            })?),
            None => None,
        };

        Ok(Self {
            include,
            exclude,
            require,
            free_only: params.bool("free_only").unwrap_or(free_only_default),
        })
    }

    pub fn free_only(&self) -> bool {
        self.free_only
    }

    pub fn with_free_only(mut self, free_only: bool) -> Self {
        self.free_only = free_only;
        self
    }

    pub fn accepts(&self, model: &ModelDescriptor) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|p| p.matches(&model.id)) {
            return false;
        }
        if self.exclude.iter().any(|p| p.matches(&model.id)) {
            return false;
        }
        if let Some(required) = &self.require
            && !model.capabilities.matches(required)
        {
            return false;
        }
        !self.free_only || model.is_free()
    }

    pub fn apply(&self, models: Vec<ModelDescriptor>) -> Vec<ModelDescriptor> {
        models.into_iter().filter(|m| self.accepts(m)).collect()
    }
}

fn patterns(params: &ResolvedParams, field: &str) -> Result<Vec<Pattern>> {
    params
        .strings(field)
        .unwrap_or_default()
        .iter()
        .map(|raw| {
            Pattern::new(raw).map_err(|e| {
                Error::InvalidConfiguration(format!("bad `{field}` pattern {raw:?}: {e}"))
            })
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Parameter helpers
// ────────────────────────────────────────────────────────────────────────────

/// A required string field.
///
/// An unset placeholder is reported as the variable it referenced; an
/// absent field is a configuration error.
pub(crate) fn required_str<'a>(
    params: &'a ResolvedParams,
    provider: &str,
    fields: &[&str],
) -> Result<&'a str> {
    for field in fields {
        if let Some(value) = params.str(field) {
            return Ok(value);
        }
    }
    if let Some((field, var)) = fields
        .iter()
        .find_map(|f| params.unresolved(f).map(|var| (*f, var)))
    {
        return Err(Error::MissingEnvironmentVariable {
            var: var.to_string(),
            field: field.to_string(),
        });
    }
    Err(Error::InvalidConfiguration(format!(
        "provider `{provider}` requires `{}`",
        fields[0]
    )))
}

/// The `api_key` field; an unset placeholder makes it absent.
pub(crate) fn optional_key(params: &ResolvedParams) -> Option<ApiKey> {
    params.str("api_key").map(ApiKey::from)
}

/// Endpoint URL without a trailing slash.
pub(crate) fn normalize_base(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
