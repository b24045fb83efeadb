//! `freerouter init`: seed a `providers.yaml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use dialoguer::console::Term;
use dialoguer::{Confirm, Select, theme::ColorfulTheme};

use crate::ui::{print_header, print_success};

#[derive(Args)]
pub struct InitArgs {
    /// Write to the user config directory (~/.config/freerouter)
    #[arg(long, conflicts_with = "project")]
    pub user: bool,

    /// Write to ./config in the current directory
    #[arg(long)]
    pub project: bool,

    /// Overwrite an existing providers.yaml without asking
    #[arg(short, long)]
    pub force: bool,
}

/// Every supported provider, disabled.
pub const PROVIDERS_TEMPLATE: &str = r#"# freerouter provider declarations
#
# Set `enabled: true` on the providers you want, then run `freerouter fetch`.
# `${NAME}` is replaced with the environment variable NAME (a .env file in
# the working directory is loaded first).

settings:
  host: 0.0.0.0
  port: 4000
  # master_key: ${LITELLM_MASTER_KEY}
  fetch_timeout: 10
  request_timeout: 600
  num_retries: 2
  routing_strategy: simple-shuffle
  # warn: later providers replace earlier ones; strict: fail the fetch
  on_duplicate: warn
  concurrent: true

providers:
  # OpenRouter: free models only unless free_only is false
  - type: openrouter
    enabled: false
    api_key: ${OPENROUTER_API_KEY}
    free_only: true

  # ModelScope inference API
  - type: modelscope
    enabled: false
    api_key: ${MODELSCOPE_API_KEY}

  # iFlow
  - type: iflow
    enabled: false
    api_key: ${IFLOW_API_KEY}

  # Any OpenAI-compatible endpoint (vLLM, LM Studio, one-api, ...)
  - type: oai
    enabled: false
    name: my-endpoint
    api_base: http://localhost:8000/v1
    api_key: ${OAI_API_KEY}
    # include: ["qwen*"]
    # exclude: ["*-embedding*"]

  # Local Ollama daemon; skipped when it is not running
  - type: ollama
    enabled: false
    api_base: http://localhost:11434

  # A fixed list of models on a known backend
  - type: static
    enabled: false
    backend: openai
    api_base: https://api.example.com/v1
    api_key: ${EXAMPLE_API_KEY}
    models:
      - gpt-4o-mini

  # Exactly one model
  - type: manual
    enabled: false
    model_name: gpt-4o
    provider: openai
    api_key: ${OPENAI_API_KEY}
"#;

const LOCATION_USER: &str = "User config (~/.config/freerouter) - recommended";
const LOCATION_PROJECT: &str = "Project config (./config)";

pub fn run(args: InitArgs) -> Result<()> {
    let dir = target_dir(&args)?;
    let path = dir.join(freerouter_paths::PROVIDERS_FILE);

    let overwrite = args.force || !path.exists() || confirm_overwrite(&path)?;
    if !overwrite {
        println!("Keeping existing {}", path.display());
        return Ok(());
    }

    install(&path)?;

    print_header("FreeRouter initialized");
    print_success(&format!("Configuration initialized: {}", path.display()));
    print_success("All providers are disabled by default (enabled: false)");
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to configure your providers", path.display());
    println!("  2. Set enabled: true for the providers you want to use");
    println!("  3. Run 'freerouter fetch' to fetch the model list");
    println!("  4. Run 'freerouter start' to start the service");
    Ok(())
}

fn target_dir(args: &InitArgs) -> Result<PathBuf> {
    if args.user {
        return Ok(freerouter_paths::config_dir());
    }
    if args.project {
        return Ok(freerouter_paths::project_dir());
    }
    if !Term::stdout().is_term() {
        return Ok(freerouter_paths::config_dir());
    }

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Where should the configuration live?")
        .items(&[LOCATION_USER, LOCATION_PROJECT])
        .default(0)
        .interact()?;
    Ok(if selection == 0 {
        freerouter_paths::config_dir()
    } else {
        freerouter_paths::project_dir()
    })
}

fn confirm_overwrite(path: &Path) -> Result<bool> {
    if !Term::stdout().is_term() {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("{} already exists. Overwrite?", path.display()))
        .default(false)
        .interact()?)
}

/// Write the template, creating the directory.
fn install(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, PROVIDERS_TEMPLATE)
        .with_context(|| format!("Failed to write {}", path.display()))
}
