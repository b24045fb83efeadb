//! Proxy state file management
//!
//! Tracks the running proxy with PID, address, config and start time.
//! State is persisted next to the generated config as `freerouter.pid`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State of a running proxy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProxyState {
    pub pid: u32,
    pub port: u16,
    pub host: String,
    /// Config file the proxy was started with
    pub config: PathBuf,
    pub started_at: DateTime<Utc>,
}

impl ProxyState {
    pub fn new(pid: u32, host: &str, port: u16, config: &Path) -> Self {
        Self {
            pid,
            port,
            host: host.to_string(),
            config: config.to_path_buf(),
            started_at: Utc::now(),
        }
    }

    /// Seconds since the proxy was started.
    pub fn uptime_secs(&self) -> u64 {
        (Utc::now() - self.started_at).num_seconds().max(0) as u64
    }
}

/// What a pid file says about the proxy.
#[derive(Debug, Clone, PartialEq)]
pub enum Liveness {
    /// No pid file.
    NotRunning,
    /// The recorded process exists.
    Running(ProxyState),
    /// A pid file whose process is gone (or that could not be parsed).
    Stale(Option<u32>),
}

/// Read the state file.
///
/// A file holding only a bare integer PID is accepted; its start time is
/// taken from the file's modification time. Returns `Ok(None)` when the
/// file does not exist.
pub fn read_state(path: &Path) -> io::Result<Option<ProxyState>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    if let Ok(state) = serde_json::from_str::<ProxyState>(&content) {
        return Ok(Some(state));
    }

    let pid: u32 = content.trim().parse().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unrecognized pid file {}", path.display()),
        )
    })?;
    let started_at = fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());
    Ok(Some(ProxyState {
        pid,
        port: 0,
        host: String::new(),
        config: PathBuf::new(),
        started_at,
    }))
}

/// Write the state file, creating parent directories if needed
pub fn write_state(path: &Path, state: &ProxyState) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(state)?;
    fs::write(path, content)
}

/// Remove the state file if it exists
pub fn clear_state(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Inspect the pid file and the process it names. Stale files are left in
/// place; callers decide whether to clean them up.
pub fn liveness(path: &Path) -> Liveness {
    match read_state(path) {
        Ok(None) => Liveness::NotRunning,
        Ok(Some(state)) if is_process_alive(state.pid) => Liveness::Running(state),
        Ok(Some(state)) => Liveness::Stale(Some(state.pid)),
        Err(_) => Liveness::Stale(None),
    }
}

/// Check if a process is still alive
///
/// Uses kill(pid, 0) on Unix to check if the process exists
#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    // SAFETY: signal 0 performs the existence check without delivering anything.
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
pub fn is_process_alive(_pid: u32) -> bool {
    false
}
