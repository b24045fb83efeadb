use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use freerouter_core::config::{Declarations, Settings};
use freerouter_core::env::ProcessEnv;
use tracing::{debug, info, warn};

/// Where the CLI reads declarations from and writes the proxy config to.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigPaths {
    /// Explicit `--config`, else the first `providers.yaml` found.
    pub providers: Option<PathBuf>,
    pub output: PathBuf,
}

/// A loaded `providers.yaml` with environment overrides applied.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub path: PathBuf,
    pub declarations: Declarations,
}

impl ConfigPaths {
    pub fn resolve(providers: Option<PathBuf>, output: Option<PathBuf>) -> Self {
        Self {
            providers: providers.or_else(freerouter_paths::find_providers_file),
            output: output.unwrap_or_else(freerouter_paths::output_file),
        }
    }

    pub fn log_file(&self) -> PathBuf {
        freerouter_paths::log_file_for(&self.output)
    }

    pub fn pid_file(&self) -> PathBuf {
        freerouter_paths::pid_file_for(&self.output)
    }

    /// Load and validate `providers.yaml`.
    pub fn load(&self) -> Result<LoadedConfig> {
        let Some(path) = &self.providers else {
            let searched: Vec<String> = freerouter_paths::search_dirs()
                .iter()
                .map(|d| d.join(freerouter_paths::PROVIDERS_FILE).display().to_string())
                .collect();
            bail!(
                "No providers.yaml found (searched: {}). Run 'freerouter init' first.",
                searched.join(", ")
            );
        };

        let mut declarations = Declarations::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        declarations.settings.apply_env_overrides(&ProcessEnv);
        debug!(
            path = %path.display(),
            providers = declarations.providers.len(),
            "Loaded provider declarations"
        );

        Ok(LoadedConfig {
            path: path.clone(),
            declarations,
        })
    }

    /// Settings for commands that work without a declaration file
    /// (`stop`, `status`, `list`): the file's settings when it loads,
    /// otherwise defaults plus environment overrides.
    pub fn settings(&self) -> Settings {
        match self.providers.as_ref().map(|p| Declarations::load(p)) {
            Some(Ok(decls)) => {
                let mut settings = decls.settings;
                settings.apply_env_overrides(&ProcessEnv);
                settings
            }
            Some(Err(e)) => {
                warn!("Ignoring unreadable providers.yaml: {}", e);
                defaults()
            }
            None => defaults(),
        }
    }
}

fn defaults() -> Settings {
    let mut settings = Settings::default();
    settings.apply_env_overrides(&ProcessEnv);
    settings
}

/// Load a `.env` file from the working directory if one exists.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => info!("Loaded environment variables from {}", path.display()),
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to load .env file: {}", e),
    }
}
