//! `freerouter fetch`: discover models and write the proxy config.

use std::sync::Arc;

use anyhow::{Result, bail};
use freerouter_core::auth::{MASTER_KEY_ENV, MasterKeySource, resolve_master_key};
use freerouter_core::env::ProcessEnv;
use freerouter_core::factory::{ProviderFactory, ProviderRegistry};
use freerouter_core::providers::BuildContext;
use freerouter_core::{Error, FetchReport, Fetcher};
use tracing::info;

use crate::backup;
use crate::config::ConfigPaths;
use crate::ui::{print_error, print_header, print_success};

pub async fn run(paths: &ConfigPaths) -> Result<FetchReport> {
    let loaded = paths.load()?;
    let settings = &loaded.declarations.settings;

    print_header("Fetching models");
    println!("  Providers: {}", loaded.path.display());
    println!("  Output:    {}", paths.output.display());
    println!();

    let factory = ProviderFactory::new(
        ProviderRegistry::builtin(),
        Arc::new(ProcessEnv),
        BuildContext::new(settings.fetch_timeout()),
    );
    let built = factory.create_all(&loaded.declarations.providers);
    if built.disabled > 0 {
        info!("{} provider(s) disabled", built.disabled);
    }

    if built.providers.is_empty() {
        for failure in &built.failures {
            print_error(&format!("{}: {}", failure.name, failure.error));
        }
        bail!(
            "{}: enable at least one provider in {}",
            Error::NoProvidersConfigured,
            loaded.path.display()
        );
    }

    let (master_key, source) = resolve_master_key(settings.master_key.as_deref(), &ProcessEnv);

    if let Some(backup) = backup::create(&paths.output)? {
        info!(
            "Backed up previous config to {} (restore with: freerouter restore {})",
            backup.display(),
            backup
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
    }

    let fetcher = Fetcher::from_settings(&paths.output, settings, master_key);
    let report = fetcher
        .run(built.providers)
        .await?
        .with_build_failures(built.failures);

    for line in report.lines() {
        println!("  {line}");
    }
    for overwrite in &report.overwrites {
        println!(
            "  ! {}: {} replaced {}",
            overwrite.model_name, overwrite.winner, overwrite.replaced
        );
    }
    println!();
    println!("{}", report.summary());

    print_success(&format!(
        "Wrote {} models to {}",
        report.document.model_list.len(),
        paths.output.display()
    ));
    if source == MasterKeySource::Generated {
        println!(
            "  A master key was generated for this config; set {} to keep it stable.",
            MASTER_KEY_ENV
        );
    }

    Ok(report)
}
