use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

mod backup;
mod commands;
mod config;
mod daemon;
mod ui;

#[derive(Parser)]
#[command(
    name = "freerouter",
    about = "Generate and supervise an LLM routing proxy from your provider list"
)]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Provider declaration file (default: ./config/providers.yaml, then ~/.config/freerouter/providers.yaml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Generated proxy config (default: ./config/config.yaml if ./config exists, else ~/.config/freerouter/config.yaml)
    #[arg(long, global = true, value_name = "PATH")]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a providers.yaml with every provider disabled
    Init(commands::init::InitArgs),
    /// Discover models and write the proxy config
    Fetch,
    /// Start the proxy in the background
    Start,
    /// Stop the running proxy
    Stop(commands::serve::StopArgs),
    /// Stop and start the proxy, optionally refetching first
    #[command(alias = "reload")]
    Restart(commands::serve::RestartArgs),
    /// Show proxy status
    Status,
    /// Show the proxy log
    Logs(commands::logs::LogsArgs),
    /// List the models in the generated config
    List,
    /// Restore the proxy config from a backup
    Restore(commands::restore::RestoreArgs),
    /// Show configuration paths and settings
    Config(commands::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    config::load_dotenv();

    let paths = config::ConfigPaths::resolve(cli.config, cli.output);

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Init(args) => commands::init::run(args),
        Commands::Fetch => commands::fetch::run(&paths).await.map(|_| ()),
        Commands::Start => commands::serve::start(&paths).await,
        Commands::Stop(args) => commands::serve::stop(&paths, args).await,
        Commands::Restart(args) => commands::serve::restart(&paths, args).await,
        Commands::Status => commands::serve::status(&paths),
        Commands::Logs(args) => commands::logs::run(&paths, args).await,
        Commands::List => commands::list::run(&paths),
        Commands::Restore(args) => commands::restore::run(&paths, args),
        Commands::Config(args) => commands::config::run(&paths, args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_invocation_has_no_command() {
        let cli = Cli::parse_from(["freerouter"]);
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn reload_is_an_alias_for_restart() {
        let cli = Cli::parse_from(["freerouter", "reload", "-r"]);
        match cli.command {
            Some(Commands::Restart(args)) => assert!(args.refresh),
            _ => panic!("expected restart"),
        }
    }

    #[test]
    fn global_path_overrides() {
        let cli = Cli::parse_from([
            "freerouter",
            "fetch",
            "--config",
            "/tmp/p.yaml",
            "--output",
            "/tmp/c.yaml",
            "-v",
        ]);
        assert!(matches!(cli.command, Some(Commands::Fetch)));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/p.yaml")));
        assert_eq!(cli.output, Some(PathBuf::from("/tmp/c.yaml")));
        assert!(cli.verbose);
    }
}
