//! Fetch cycle: discover, filter, format, merge, write.
//!
//! ```text
//!  providers (declaration order)
//!      │  fetch_models   (concurrent or sequential)
//!      ▼
//!  per-provider outcome ── failure ──▶ report line, zero models
//!      │  filter_models → format_service
//!      ▼
//!  merge by model_name (declaration order, last write wins)
//!      │
//!      ▼
//!  OutputDocument ──▶ temp file in target dir ──▶ rename
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::config::{CollisionPolicy, Settings};
use crate::factory::BuildFailure;
use crate::providers::Provider;
use crate::{
    Error, LitellmSettings, ModelDescriptor, OutputDocument, Result, RouterSettings, ServiceEntry,
};

/// What one provider contributed to a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// `models` entries survived filtering (`discovered` before filtering).
    Contributed { discovered: usize, models: usize },
    /// Local daemon not running.
    Skipped { reason: String },
    Failed { kind: &'static str, message: String },
}

/// Report line for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReport {
    pub name: String,
    pub outcome: Outcome,
}

impl ProviderReport {
    pub fn contributed(&self) -> bool {
        matches!(self.outcome, Outcome::Contributed { models, .. } if models > 0)
    }
}

impl fmt::Display for ProviderReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Contributed { discovered, models } if discovered == models => {
                write!(f, "✓ {}: {} models", self.name, models)
            }
            Outcome::Contributed { discovered, models } => write!(
                f,
                "✓ {}: {} models ({} discovered)",
                self.name, models, discovered
            ),
            Outcome::Skipped { reason } => write!(f, "- {}: skipped ({})", self.name, reason),
            Outcome::Failed { kind, message } => {
                write!(f, "✗ {}: {} ({})", self.name, kind, message)
            }
        }
    }
}

/// A routable name claimed by more than one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overwrite {
    pub model_name: String,
    /// Provider whose entry was replaced.
    pub replaced: String,
    /// Provider whose entry was kept.
    pub winner: String,
}

/// Result of a fetch cycle.
#[derive(Debug)]
pub struct FetchReport {
    pub document: OutputDocument,
    /// One line per provider instance, in declaration order.
    pub providers: Vec<ProviderReport>,
    pub overwrites: Vec<Overwrite>,
    /// Declarations that never became providers.
    pub build_failures: Vec<ProviderReport>,
    /// Where the document was written, if it was.
    pub written_to: Option<PathBuf>,
}

impl FetchReport {
    pub fn contributing(&self) -> usize {
        self.providers.iter().filter(|p| p.contributed()).count()
    }

    pub fn attempted(&self) -> usize {
        self.providers.len() + self.build_failures.len()
    }

    /// Every report line, build failures first.
    pub fn lines(&self) -> impl Iterator<Item = &ProviderReport> {
        self.build_failures.iter().chain(self.providers.iter())
    }

    /// Attach declarations the factory could not build.
    pub fn with_build_failures(mut self, failures: Vec<BuildFailure>) -> Self {
        self.build_failures.extend(failures.into_iter().map(|f| ProviderReport {
            name: f.name,
            outcome: Outcome::Failed {
                kind: f.error.kind(),
                message: f.error.to_string(),
            },
        }));
        self
    }

    /// e.g. "3 of 4 providers contributed models; ollama was unreachable".
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} of {} providers contributed models",
            self.contributing(),
            self.attempted()
        );
        let problems: Vec<String> = self
            .lines()
            .filter_map(|line| match &line.outcome {
                Outcome::Contributed { models: 0, .. } => {
                    Some(format!("{} had no matching models", line.name))
                }
                Outcome::Contributed { .. } => None,
                Outcome::Skipped { .. } => Some(format!("{} was unreachable", line.name)),
                Outcome::Failed { kind, .. } => Some(format!("{}: {}", line.name, kind)),
            })
            .collect();
        if !problems.is_empty() {
            summary.push_str("; ");
            summary.push_str(&problems.join(", "));
        }
        summary
    }
}

/// Runs fetch cycles into one output path.
#[derive(Debug, Clone)]
pub struct Fetcher {
    output: PathBuf,
    collision: CollisionPolicy,
    concurrent: bool,
    litellm_settings: LitellmSettings,
    router_settings: RouterSettings,
}

impl Fetcher {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            collision: CollisionPolicy::Warn,
            concurrent: true,
            litellm_settings: LitellmSettings::default(),
            router_settings: RouterSettings::default(),
        }
    }

    /// Fetcher configured from the declaration's `settings` block.
    pub fn from_settings(output: impl Into<PathBuf>, settings: &Settings, master_key: String) -> Self {
        Self::new(output)
            .collision_policy(settings.on_duplicate)
            .concurrent(settings.concurrent)
            .litellm_settings(LitellmSettings {
                request_timeout: settings.request_timeout,
                master_key: Some(master_key),
                ..LitellmSettings::default()
            })
            .router_settings(RouterSettings {
                routing_strategy: settings.routing_strategy.clone(),
                num_retries: settings.num_retries,
            })
    }

    pub fn collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision = policy;
        self
    }

    pub fn concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    pub fn litellm_settings(mut self, settings: LitellmSettings) -> Self {
        self.litellm_settings = settings;
        self
    }

    pub fn router_settings(mut self, settings: RouterSettings) -> Self {
        self.router_settings = settings;
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Run a full cycle and write the document.
    ///
    /// Per-provider failures only show up in the report. Errors are
    /// returned for an empty provider list, a strict-mode collision, or a
    /// failed write; nothing is written in those cases.
    pub async fn run(&self, providers: Vec<Box<dyn Provider>>) -> Result<FetchReport> {
        let mut report = self.collect(providers).await?;
        write_atomic(&self.output, report.document.to_yaml()?.as_bytes())?;
        info!(
            path = %self.output.display(),
            models = report.document.model_list.len(),
            "Wrote proxy config"
        );
        report.written_to = Some(self.output.clone());
        Ok(report)
    }

    /// Run a cycle without touching the filesystem.
    pub async fn collect(&self, providers: Vec<Box<dyn Provider>>) -> Result<FetchReport> {
        if providers.is_empty() {
            return Err(Error::NoProvidersConfigured);
        }

        let results = if self.concurrent {
            join_all(providers.iter().map(|p| p.fetch_models())).await
        } else {
            let mut results = Vec::with_capacity(providers.len());
            for provider in &providers {
                results.push(provider.fetch_models().await);
            }
            results
        };

        let mut merger = Merger::new(self.collision);
        let mut lines = Vec::with_capacity(providers.len());

        for (provider, result) in providers.iter().zip(results) {
            let outcome = match result {
                Ok(models) => {
                    let discovered = models.len();
                    let entries = format_all(provider.as_ref(), models);
                    let count = entries.len();
                    merger.extend(provider.name(), entries)?;
                    info!(provider = %provider.name(), discovered, models = count, "Provider fetched");
                    Outcome::Contributed {
                        discovered,
                        models: count,
                    }
                }
                Err(Error::UpstreamUnavailable { reason, .. }) if provider.unavailable_is_skip() => {
                    info!(provider = %provider.name(), %reason, "Provider not running, skipping");
                    Outcome::Skipped { reason }
                }
                Err(error) => {
                    warn!(provider = %provider.name(), %error, "Provider failed");
                    Outcome::Failed {
                        kind: error.kind(),
                        message: error.to_string(),
                    }
                }
            };
            lines.push(ProviderReport {
                name: provider.name().to_string(),
                outcome,
            });
        }

        let (model_list, overwrites) = merger.finish();
        let report = FetchReport {
            document: OutputDocument {
                model_list,
                litellm_settings: self.litellm_settings.clone(),
                router_settings: self.router_settings.clone(),
            },
            providers: lines,
            overwrites,
            build_failures: Vec::new(),
            written_to: None,
        };

        if report.contributing() == 0 {
            warn!("No provider contributed any models; writing an empty model list");
        }
        Ok(report)
    }
}

fn format_all(provider: &dyn Provider, models: Vec<ModelDescriptor>) -> Vec<ServiceEntry> {
    provider
        .filter_models(models)
        .iter()
        .map(|model| provider.format_service(model))
        .collect()
}

/// Order-preserving merge keyed by routable name.
///
/// A later entry replaces an earlier one in place, so the list keeps the
/// position where the name first appeared.
struct Merger {
    policy: CollisionPolicy,
    entries: Vec<ServiceEntry>,
    /// model_name -> (index into `entries`, owning provider)
    index: HashMap<String, (usize, String)>,
    overwrites: Vec<Overwrite>,
}

impl Merger {
    fn new(policy: CollisionPolicy) -> Self {
        Self {
            policy,
            entries: Vec::new(),
            index: HashMap::new(),
            overwrites: Vec::new(),
        }
    }

    fn extend(&mut self, provider: &str, entries: Vec<ServiceEntry>) -> Result<()> {
        // Names this call has already placed; a provider repeating its own
        // id is not a cross-provider collision.
        let mut own: HashSet<String> = HashSet::new();
        for entry in entries {
            match self.index.get_mut(&entry.model_name) {
                Some((position, _)) if own.contains(&entry.model_name) => {
                    debug!(
                        model = %entry.model_name,
                        provider = %provider,
                        "Provider listed a model twice, keeping the later entry"
                    );
                    self.entries[*position] = entry;
                }
                Some((position, owner)) => {
                    if self.policy == CollisionPolicy::Strict {
                        return Err(Error::DuplicateService {
                            model_name: entry.model_name,
                            first: owner.clone(),
                            second: provider.to_string(),
                        });
                    }
                    warn!(
                        model = %entry.model_name,
                        replaced = %owner,
                        winner = %provider,
                        "Duplicate model name, later provider wins"
                    );
                    self.overwrites.push(Overwrite {
                        model_name: entry.model_name.clone(),
                        replaced: std::mem::replace(owner, provider.to_string()),
                        winner: provider.to_string(),
                    });
                    own.insert(entry.model_name.clone());
                    self.entries[*position] = entry;
                }
                None => {
                    own.insert(entry.model_name.clone());
                    self.index.insert(
                        entry.model_name.clone(),
                        (self.entries.len(), provider.to_string()),
                    );
                    self.entries.push(entry);
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> (Vec<ServiceEntry>, Vec<Overwrite>) {
        (self.entries, self.overwrites)
    }
}

/// Replace `path` with `contents` so readers see the old or the new file,
/// never a partial one.
///
/// The data goes to a temporary file in the same directory, is flushed to
/// disk, and is then renamed over `path`.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let fail = |source: std::io::Error| Error::OutputWriteFailure {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(fail)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(&temp_prefix(path))
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(fail)?;
    tmp.write_all(contents).map_err(fail)?;
    tmp.as_file().sync_all().map_err(fail)?;
    tmp.persist(path).map_err(|e| fail(e.error))?;

    debug!(path = %path.display(), bytes = contents.len(), "Atomically replaced file");
    Ok(())
}

/// Hidden sibling name for the in-flight copy of `path`.
fn temp_prefix(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    format!(".{name}.")
}
