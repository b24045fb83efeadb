//! `start`, `stop`, `restart` and `status`.

use std::time::Duration;

use anyhow::{Result, bail};
use clap::Args;
use freerouter_core::OutputDocument;
use freerouter_core::config::Settings;
use tracing::{debug, warn};

use crate::config::ConfigPaths;
use crate::daemon::{
    self, LaunchSpec, Liveness, ProxyState, READY_TIMEOUT, Readiness, STOP_TIMEOUT, StopOutcome,
};
use crate::ui::{print_field, print_header, print_success};

use super::fetch;

#[derive(Args)]
pub struct StopArgs {
    /// Seconds to wait after SIGTERM before sending SIGKILL
    #[arg(long, default_value_t = STOP_TIMEOUT.as_secs())]
    pub timeout: u64,
}

#[derive(Args)]
pub struct RestartArgs {
    /// Fetch a fresh model list before restarting
    #[arg(short, long)]
    pub refresh: bool,

    /// Seconds to wait after SIGTERM before sending SIGKILL
    #[arg(long, default_value_t = STOP_TIMEOUT.as_secs())]
    pub timeout: u64,
}

pub async fn start(paths: &ConfigPaths) -> Result<()> {
    if !paths.output.is_file() {
        bail!(
            "Config not found: {}. Run 'freerouter fetch' first.",
            paths.output.display()
        );
    }

    let pid_file = paths.pid_file();
    match daemon::liveness(&pid_file) {
        Liveness::Running(state) => bail!(
            "FreeRouter is already running (PID: {}). Use 'freerouter restart' to restart it.",
            state.pid
        ),
        Liveness::Stale(pid) => {
            debug!(?pid, "Removing stale PID file");
            daemon::clear_state(&pid_file)?;
        }
        Liveness::NotRunning => {}
    }

    let settings = paths.settings();
    let log_file = paths.log_file();
    print_header("Starting FreeRouter");
    print_field("Host", &settings.host);
    print_field("Port", settings.port);
    print_field("Config", paths.output.display());
    print_field("Log", log_file.display());
    println!();

    let spec = LaunchSpec {
        program: settings.proxy_command.clone(),
        config: paths.output.clone(),
        host: settings.host.clone(),
        port: settings.port,
        log_file: log_file.clone(),
    };
    let mut launched = daemon::spawn(&spec)?;
    let pid = launched.child.id();
    daemon::write_state(
        &pid_file,
        &ProxyState::new(pid, &settings.host, settings.port, &paths.output),
    )?;

    println!("Waiting for service to start...");
    let readiness =
        daemon::wait_for_ready(&mut launched, &log_file, READY_TIMEOUT, |line| println!("{line}"))
            .await?;

    match readiness {
        Readiness::Ready => {
            println!();
            print_success("FreeRouter started successfully!");
            print_field("PID", pid);
            print_field("URL", settings.service_url());
            print_field("Logs", log_file.display());
            println!();
            println!("Commands:");
            println!("  freerouter logs      View real-time logs");
            println!("  freerouter stop      Stop the service");
            Ok(())
        }
        Readiness::Failed(line) => {
            let _ = launched.child.kill();
            let _ = launched.child.wait();
            daemon::clear_state(&pid_file)?;
            bail!("Startup failed: {line}\nCheck logs: {}", log_file.display())
        }
        Readiness::Exited(status) => {
            daemon::clear_state(&pid_file)?;
            bail!(
                "Proxy exited during startup ({status}). Check logs: {}",
                log_file.display()
            )
        }
        Readiness::TimedOut => {
            warn!("Startup timeout! The service may still be starting.");
            println!("Check logs: freerouter logs");
            println!("If it failed, stop it with: freerouter stop");
            Ok(())
        }
    }
}

pub async fn stop(paths: &ConfigPaths, args: StopArgs) -> Result<()> {
    let pid_file = paths.pid_file();
    match daemon::liveness(&pid_file) {
        Liveness::NotRunning => {
            println!("FreeRouter is not running");
            Ok(())
        }
        Liveness::Stale(pid) => {
            daemon::clear_state(&pid_file)?;
            match pid {
                Some(pid) => println!("FreeRouter is not running (removed stale PID file for {pid})"),
                None => println!("FreeRouter is not running (removed unreadable PID file)"),
            }
            Ok(())
        }
        Liveness::Running(state) => {
            println!("Stopping FreeRouter (PID: {})...", state.pid);
            let outcome = daemon::terminate(state.pid, Duration::from_secs(args.timeout)).await?;
            daemon::clear_state(&pid_file)?;
            match outcome {
                StopOutcome::Terminated => print_success("FreeRouter stopped"),
                StopOutcome::Killed => print_success("FreeRouter force-killed"),
                StopOutcome::NotRunning => println!("FreeRouter had already exited"),
            }
            Ok(())
        }
    }
}

pub async fn restart(paths: &ConfigPaths, args: RestartArgs) -> Result<()> {
    print_header("Reloading FreeRouter");

    if args.refresh {
        println!("Refreshing configuration from providers...");
        fetch::run(paths).await?;
    }

    if matches!(daemon::liveness(&paths.pid_file()), Liveness::Running(_)) {
        stop(paths, StopArgs { timeout: args.timeout }).await?;
        tokio::time::sleep(Duration::from_secs(1)).await;
    } else {
        println!("Service is not running");
    }

    start(paths).await?;
    print_success("Service reloaded");
    Ok(())
}

pub fn status(paths: &ConfigPaths) -> Result<()> {
    let pid_file = paths.pid_file();
    print_header("FreeRouter Service Status");

    match daemon::liveness(&pid_file) {
        Liveness::NotRunning => {
            print_field("Status", "○ Not Running");
            println!();
            println!("Start service with: freerouter start");
        }
        Liveness::Stale(pid) => {
            print_field("Status", "○ Not Running (stale PID file)");
            if let Some(pid) = pid {
                print_field("PID", format!("{pid} (not found)"));
            }
            daemon::clear_state(&pid_file)?;
            println!();
            println!("Clean up done; start with: freerouter start");
        }
        Liveness::Running(state) => {
            print_field("Status", "● Running");
            print_field("PID", state.pid);
            print_field("URL", service_url(&state, &paths.settings()));
            print_field("Config", paths.output.display());
            print_field("Uptime", format_uptime(state.uptime_secs()));
            if let Ok(doc) = OutputDocument::load(&paths.output) {
                print_field("Models", format!("{} configured", doc.model_list.len()));
            }
            let log_file = paths.log_file();
            if let Ok(meta) = std::fs::metadata(&log_file) {
                print_field(
                    "Log",
                    format!("{} ({:.1} KB)", log_file.display(), meta.len() as f64 / 1024.0),
                );
            }
        }
    }
    Ok(())
}

/// URL of a running proxy; pid files without an address fall back to the
/// current settings.
pub fn service_url(state: &ProxyState, fallback: &Settings) -> String {
    if state.port == 0 {
        return fallback.service_url();
    }
    Settings {
        host: state.host.clone(),
        port: state.port,
        ..Settings::default()
    }
    .service_url()
}

/// "42 seconds", "3 minutes", "2 hours 5 minutes", "1 day 4 hours".
pub fn format_uptime(seconds: u64) -> String {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;
    const DAY: u64 = 24 * HOUR;

    if seconds < MINUTE {
        format!("{seconds} seconds")
    } else if seconds < HOUR {
        plural(seconds / MINUTE, "minute")
    } else if seconds < DAY {
        format!(
            "{} {}",
            plural(seconds / HOUR, "hour"),
            plural(seconds % HOUR / MINUTE, "minute")
        )
    } else {
        format!(
            "{} {}",
            plural(seconds / DAY, "day"),
            plural(seconds % DAY / HOUR, "hour")
        )
    }
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("{n} {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn uptime_formatting() {
        assert_eq!(format_uptime(0), "0 seconds");
        assert_eq!(format_uptime(59), "59 seconds");
        assert_eq!(format_uptime(60), "1 minute");
        assert_eq!(format_uptime(125), "2 minutes");
        assert_eq!(format_uptime(3600), "1 hour 0 minutes");
        assert_eq!(format_uptime(2 * 3600 + 60), "2 hours 1 minute");
        assert_eq!(format_uptime(86400 + 3600), "1 day 1 hour");
        assert_eq!(format_uptime(3 * 86400 + 5 * 3600 + 59), "3 days 5 hours");
    }

    #[test]
    fn service_url_prefers_recorded_address() {
        let settings = Settings::default();
        let state = ProxyState::new(1, "0.0.0.0", 4100, Path::new("c.yaml"));
        assert_eq!(service_url(&state, &settings), "http://localhost:4100");

        let state = ProxyState::new(1, "10.0.0.2", 4200, Path::new("c.yaml"));
        assert_eq!(service_url(&state, &settings), "http://10.0.0.2:4200");

        let legacy = ProxyState {
            port: 0,
            ..ProxyState::new(1, "", 0, Path::new(""))
        };
        assert_eq!(service_url(&legacy, &settings), "http://localhost:4000");
    }

    fn paths_in(dir: &TempDir) -> ConfigPaths {
        ConfigPaths {
            providers: None,
            output: dir.path().join("config.yaml"),
        }
    }

    #[tokio::test]
    async fn start_without_config_fails() {
        let dir = TempDir::new().unwrap();
        let err = start(&paths_in(&dir)).await.unwrap_err();
        assert!(err.to_string().contains("freerouter fetch"));
    }

    #[tokio::test]
    async fn start_refuses_when_already_running() {
        let dir = TempDir::new().unwrap();
        let paths = paths_in(&dir);
        std::fs::write(&paths.output, "model_list: []\n").unwrap();
        let me = ProxyState::new(std::process::id(), "0.0.0.0", 4000, &paths.output);
        daemon::write_state(&paths.pid_file(), &me).unwrap();

        let err = start(&paths).await.unwrap_err();
        assert!(err.to_string().contains("already running"));
    }

    #[tokio::test]
    async fn stop_cleans_stale_pid_file() {
        let dir = TempDir::new().unwrap();
        let paths = paths_in(&dir);
        std::fs::write(paths.pid_file(), "999999").unwrap();

        stop(&paths, StopArgs { timeout: 1 }).await.unwrap();
        assert!(!paths.pid_file().exists());
    }

    #[test]
    fn status_cleans_stale_pid_file() {
        let dir = TempDir::new().unwrap();
        let paths = paths_in(&dir);
        std::fs::write(paths.pid_file(), "999999").unwrap();

        status(&paths).unwrap();
        assert!(!paths.pid_file().exists());
    }
}
