//! `freerouter restore`: put a backed-up config back in place.

use anyhow::{Context, Result, bail};
use clap::Args;
use dialoguer::console::Term;
use dialoguer::{Confirm, theme::ColorfulTheme};
use freerouter_core::fetcher::write_atomic;

use crate::backup;
use crate::config::ConfigPaths;
use crate::ui::{print_header, print_success};

#[derive(Args)]
pub struct RestoreArgs {
    /// Backup file name (e.g. config.yaml.backup.20260101_120000) or path
    pub backup: String,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

pub fn run(paths: &ConfigPaths, args: RestoreArgs) -> Result<()> {
    let source = backup::locate(&paths.output, &args.backup);
    if !source.is_file() {
        let available = backup::list(&paths.output);
        if available.is_empty() {
            println!("No backups found next to {}", paths.output.display());
        } else {
            println!("Available backups:");
            for b in &available {
                println!("  - {} ({})", b.file_name(), b.modified_display());
            }
            println!();
            println!("Usage: freerouter restore <backup-file>");
        }
        bail!("Backup file not found: {}", source.display());
    }

    print_header("Restore Configuration");
    println!("  From: {}", source.display());
    println!("  To:   {}", paths.output.display());

    if !args.yes && !confirm()? {
        println!("Restore cancelled");
        return Ok(());
    }

    // Read first: rotating the current config away can delete `source`.
    let contents = std::fs::read(&source)
        .with_context(|| format!("Failed to read {}", source.display()))?;
    if let Some(current) = backup::create(&paths.output)? {
        println!("  Current config saved as {}", current.display());
    }
    write_atomic(&paths.output, &contents)
        .with_context(|| format!("Failed to restore {}", source.display()))?;

    print_success("Configuration restored");
    println!("To apply changes, run: freerouter reload");
    Ok(())
}

fn confirm() -> Result<bool> {
    if !Term::stdout().is_term() {
        bail!("Refusing to restore without confirmation (pass --yes)");
    }
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt("Continue?")
        .default(false)
        .interact()?)
}
