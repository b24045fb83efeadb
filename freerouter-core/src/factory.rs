//! Provider factory: type tag registry plus placeholder resolution.
//!
//! # Example
//!
//! ```
//! use freerouter_core::config::ProviderConfig;
//! use freerouter_core::factory::ProviderFactory;
//!
//! let factory = ProviderFactory::builtin();
//! let configs = vec![
//!     ProviderConfig::new("static")
//!         .param("backend", "test-backend")
//!         .param("models", vec!["m1", "m2"]),
//!     ProviderConfig::new("ollama").disabled(),
//! ];
//!
//! let built = factory.create_all(&configs);
//! assert_eq!(built.providers.len(), 1);
//! assert!(built.failures.is_empty());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::env::{EnvSource, ProcessEnv, ResolvedParams};
use crate::providers::{
    ApiDiscoveryProvider, BuildContext, IFLOW, LocalDiscoveryProvider, MODELSCOPE, ManualProvider,
    OAI, OPENROUTER, Preset, Provider, StaticListProvider,
};
use crate::{Error, Result};

/// Constructor registered for one type tag.
///
/// Receives the display name, the placeholder-resolved parameters and the
/// shared build context.
pub type Constructor = fn(&str, &ResolvedParams, &BuildContext) -> Result<Box<dyn Provider>>;

/// Mapping from type tag to constructor.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    constructors: HashMap<&'static str, Constructor>,
}

impl ProviderRegistry {
    /// A registry with no tags.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every built-in variant.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("openrouter", |name, params, ctx| api(&OPENROUTER, name, params, ctx));
        registry.register("modelscope", |name, params, ctx| api(&MODELSCOPE, name, params, ctx));
        registry.register("iflow", |name, params, ctx| api(&IFLOW, name, params, ctx));
        registry.register("oai", |name, params, ctx| api(&OAI, name, params, ctx));
        registry.register("ollama", |name, params, ctx| {
            Ok(Box::new(LocalDiscoveryProvider::from_params(name, params, ctx)?))
        });
        registry.register("static", |name, params, _| {
            Ok(Box::new(StaticListProvider::from_params(name, params)?))
        });
        registry.register("manual", |name, params, _| {
            Ok(Box::new(ManualProvider::from_params(name, params)?))
        });
        registry
    }

    /// Register (or replace) a tag.
    pub fn register(&mut self, tag: &'static str, constructor: Constructor) {
        self.constructors.insert(tag, constructor);
    }

    pub fn get(&self, tag: &str) -> Option<Constructor> {
        self.constructors.get(tag).copied()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.constructors.keys().copied().collect();
        tags.sort_unstable();
        tags
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}

fn api(
    preset: &Preset,
    name: &str,
    params: &ResolvedParams,
    ctx: &BuildContext,
) -> Result<Box<dyn Provider>> {
    Ok(Box::new(ApiDiscoveryProvider::from_params(
        preset, name, params, ctx,
    )?))
}

/// An enabled declaration that could not be turned into a provider.
#[derive(Debug)]
pub struct BuildFailure {
    /// Position in the declaration list.
    pub index: usize,
    pub name: String,
    pub error: Error,
}

/// Output of [`ProviderFactory::create_all`].
#[derive(Default)]
pub struct BuiltProviders {
    /// Instances in declaration order.
    pub providers: Vec<Box<dyn Provider>>,
    pub failures: Vec<BuildFailure>,
    /// Entries skipped because `enabled: false`.
    pub disabled: usize,
}

/// Builds providers from declarations.
#[derive(Clone)]
pub struct ProviderFactory {
    registry: ProviderRegistry,
    env: Arc<dyn EnvSource>,
    ctx: BuildContext,
}

impl ProviderFactory {
    pub fn new(registry: ProviderRegistry, env: Arc<dyn EnvSource>, ctx: BuildContext) -> Self {
        Self { registry, env, ctx }
    }

    /// Built-in registry, process environment, default timeouts.
    pub fn builtin() -> Self {
        Self::new(
            ProviderRegistry::builtin(),
            Arc::new(ProcessEnv),
            BuildContext::default(),
        )
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Build one provider, regardless of its `enabled` flag.
    pub fn create(&self, config: &ProviderConfig) -> Result<Box<dyn Provider>> {
        let tag = config.kind.trim().to_ascii_lowercase();
        let constructor = self
            .registry
            .get(&tag)
            .ok_or_else(|| Error::UnknownProviderType(config.kind.clone()))?;

        let params = ResolvedParams::resolve(&config.params, self.env.as_ref());
        constructor(config.label(), &params, &self.ctx)
    }

    /// Build every enabled declaration, in order.
    ///
    /// A declaration that fails to build is recorded and skipped; the rest
    /// are still built.
    pub fn create_all(&self, configs: &[ProviderConfig]) -> BuiltProviders {
        let mut built = BuiltProviders::default();

        for (index, config) in configs.iter().enumerate() {
            if !config.enabled {
                debug!(provider = %config.label(), "Provider disabled, skipping");
                built.disabled += 1;
                continue;
            }

            match self.create(config) {
                Ok(provider) => {
                    debug!(provider = %provider.name(), kind = %provider.kind(), "Provider ready");
                    built.providers.push(provider);
                }
                Err(error) => {
                    warn!(provider = %config.label(), %error, "Provider could not be configured");
                    built.failures.push(BuildFailure {
                        index,
                        name: config.label().to_string(),
                        error,
                    });
                }
            }
        }

        built
    }
}
