//! `freerouter logs`: print and follow the proxy log.

use std::time::Duration;

use anyhow::{Result, bail};
use clap::Args;

use crate::config::ConfigPaths;
use crate::daemon::{self, Liveness, LogCursor};

const FOLLOW_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Args)]
pub struct LogsArgs {
    /// Number of existing lines to show
    #[arg(short = 'n', long, default_value_t = 50)]
    pub lines: usize,

    /// Print the tail and exit
    #[arg(long)]
    pub no_follow: bool,
}

pub async fn run(paths: &ConfigPaths, args: LogsArgs) -> Result<()> {
    let log_file = paths.log_file();
    if !log_file.is_file() {
        bail!("Log file not found: {}", log_file.display());
    }

    // Position the follower before printing history so nothing is missed.
    let mut cursor = LogCursor::at_end(&log_file);
    for line in daemon::tail_lines(&log_file, args.lines)? {
        println!("{line}");
    }

    if args.no_follow {
        return Ok(());
    }

    let pid = match daemon::liveness(&paths.pid_file()) {
        Liveness::Running(state) => state.pid,
        _ => {
            eprintln!("FreeRouter is not running (start it with: freerouter start)");
            return Ok(());
        }
    };

    eprintln!("Following {} (PID: {}). Press Ctrl+C to exit.", log_file.display(), pid);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Stopped viewing logs");
                break;
            }
            _ = tokio::time::sleep(FOLLOW_INTERVAL) => {
                for line in cursor.poll()? {
                    println!("{line}");
                }
                if !daemon::is_process_alive(pid) {
                    eprintln!("Service stopped");
                    break;
                }
            }
        }
    }
    Ok(())
}
