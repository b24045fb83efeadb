use anyhow::Result;
use clap::{Args, Subcommand};
use freerouter_core::factory::ProviderRegistry;

use crate::config::ConfigPaths;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: Option<ConfigCommands>,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show configuration file paths (default)
    Path,
    /// Show effective settings and declared providers
    Show,
}

pub fn run(paths: &ConfigPaths, args: ConfigArgs) -> Result<()> {
    match args.command.unwrap_or(ConfigCommands::Path) {
        ConfigCommands::Path => show_paths(paths),
        ConfigCommands::Show => show_config(paths),
    }
}

fn show_paths(paths: &ConfigPaths) -> Result<()> {
    match &paths.providers {
        Some(p) => println!("Providers: {}", p.display()),
        None => println!("Providers: (none found; run 'freerouter init')"),
    }
    println!("Output:    {}", paths.output.display());
    println!("Log:       {}", paths.log_file().display());
    println!("PID:       {}", paths.pid_file().display());
    println!("User dir:  {}", freerouter_paths::config_dir().display());
    println!("Project:   {}", freerouter_paths::project_dir().display());
    Ok(())
}

fn show_config(paths: &ConfigPaths) -> Result<()> {
    let loaded = paths.load()?;
    let mut settings = loaded.declarations.settings.clone();
    if settings.master_key.is_some() {
        settings.master_key = Some("********".to_string());
    }

    println!("# {}", loaded.path.display());
    println!("settings:");
    for line in serde_yaml::to_string(&settings)?.lines() {
        println!("  {line}");
    }

    println!("providers:");
    for provider in &loaded.declarations.providers {
        let state = if provider.enabled { "enabled" } else { "disabled" };
        println!("  - {} ({}, {})", provider.label(), provider.kind, state);
    }

    println!();
    println!(
        "Supported types: {}",
        ProviderRegistry::builtin().tags().join(", ")
    );
    Ok(())
}
