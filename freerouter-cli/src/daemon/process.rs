//! Proxy subprocess lifecycle.
//!
//! The proxy runs detached in its own session with stdout and stderr
//! appended to the log file. Readiness is decided by scanning that log,
//! since the proxy offers no other startup signal before it binds.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::state::is_process_alive;

/// Maximum time to wait for the proxy to report readiness.
pub const READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between log scans and liveness checks.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Default grace period between SIGTERM and SIGKILL.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// The proxy reads this before its `--config` flag.
const CONFIG_PATH_ENV: &str = "CONFIG_FILE_PATH";

const READY_MARKER: &str = "Uvicorn running on";

pub type Result<T> = std::result::Result<T, SupervisorError>;

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("`{program}` not found in PATH (install it with: pip install 'litellm[proxy]')")]
    NotInstalled { program: String },

    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot open log file {path}: {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to signal process {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Everything needed to launch the proxy.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub program: String,
    pub config: PathBuf,
    pub host: String,
    pub port: u16,
    pub log_file: PathBuf,
}

impl LaunchSpec {
    pub fn args(&self) -> Vec<String> {
        vec![
            "--config".to_string(),
            self.config.display().to_string(),
            "--port".to_string(),
            self.port.to_string(),
            "--host".to_string(),
            self.host.clone(),
        ]
    }
}

/// A freshly spawned proxy.
#[derive(Debug)]
pub struct Launched {
    pub child: Child,
    /// Log length before the child started; readiness is scanned from here.
    pub log_offset: u64,
}

/// Spawn the proxy detached from this process.
pub fn spawn(spec: &LaunchSpec) -> Result<Launched> {
    let program = which::which(&spec.program).map_err(|_| SupervisorError::NotInstalled {
        program: spec.program.clone(),
    })?;

    if let Some(parent) = spec.log_file.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&spec.log_file)
        .map_err(|source| SupervisorError::Log {
            path: spec.log_file.clone(),
            source,
        })?;
    let log_offset = log.metadata()?.len();
    let stderr = log.try_clone()?;

    if let Ok(previous) = std::env::var(CONFIG_PATH_ENV) {
        warn!(
            "Removing {} from the proxy environment (was: {})",
            CONFIG_PATH_ENV, previous
        );
    }

    let mut cmd = Command::new(&program);
    cmd.args(spec.args())
        .env_remove(CONFIG_PATH_ENV)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(stderr));
    detach(&mut cmd);

    let child = cmd.spawn().map_err(|source| SupervisorError::Spawn {
        program: spec.program.clone(),
        source,
    })?;
    info!(pid = child.id(), program = %program.display(), "Proxy process spawned");

    Ok(Launched { child, log_offset })
}

#[cfg(unix)]
fn detach(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;

    // SAFETY: pre_exec runs after fork and before exec; setsid makes the
    // child a session leader so it outlives this CLI.
    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn detach(_cmd: &mut Command) {}

/// How a startup wait ended.
#[derive(Debug)]
pub enum Readiness {
    Ready,
    /// A log line that looks like a fatal startup error.
    Failed(String),
    Exited(ExitStatus),
    TimedOut,
}

/// What a single log line says about startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSignal {
    Ready,
    Failure,
}

pub fn classify(line: &str) -> Option<LineSignal> {
    if line.contains(READY_MARKER) {
        return Some(LineSignal::Ready);
    }
    let lower = line.to_lowercase();
    if lower.contains("error") && lower.contains("failed") {
        return Some(LineSignal::Failure);
    }
    None
}

/// Watch the log until the proxy is ready, fails, exits, or `timeout`
/// passes. Each new log line is handed to `echo`.
pub async fn wait_for_ready(
    launched: &mut Launched,
    log_file: &Path,
    timeout: Duration,
    mut echo: impl FnMut(&str),
) -> Result<Readiness> {
    let start = Instant::now();
    let mut cursor = LogCursor::at(log_file, launched.log_offset);

    loop {
        for line in cursor.poll()? {
            echo(&line);
            match classify(&line) {
                Some(LineSignal::Ready) => {
                    debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Proxy is ready");
                    return Ok(Readiness::Ready);
                }
                Some(LineSignal::Failure) => return Ok(Readiness::Failed(line)),
                None => {}
            }
        }

        if let Some(status) = launched.child.try_wait()? {
            // Drain whatever the child wrote on its way out.
            for line in cursor.poll()? {
                echo(&line);
            }
            return Ok(Readiness::Exited(status));
        }

        if start.elapsed() >= timeout {
            return Ok(Readiness::TimedOut);
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// How a stop request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Exited after SIGTERM.
    Terminated,
    /// Still alive after the grace period and was killed.
    Killed,
    /// Already gone when the signal was sent.
    NotRunning,
}

/// SIGTERM, wait up to `grace`, then SIGKILL.
#[cfg(unix)]
pub async fn terminate(pid: u32, grace: Duration) -> Result<StopOutcome> {
    if !is_process_alive(pid) {
        return Ok(StopOutcome::NotRunning);
    }

    send_signal(pid, libc::SIGTERM)?;
    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if !is_process_alive(pid) {
            return Ok(StopOutcome::Terminated);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    warn!(pid, "Process did not exit within {:?}, sending SIGKILL", grace);
    send_signal(pid, libc::SIGKILL)?;
    for _ in 0..20 {
        if !is_process_alive(pid) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Ok(StopOutcome::Killed)
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: libc::c_int) -> Result<()> {
    // SAFETY: plain kill(2) on a pid read from our own state file.
    let rc = unsafe { libc::kill(pid as libc::pid_t, signal) };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Ok(());
    }
    Err(SupervisorError::Signal { pid, source: err })
}

#[cfg(not(unix))]
pub async fn terminate(_pid: u32, _grace: Duration) -> Result<StopOutcome> {
    Err(SupervisorError::Io(io::Error::new(
        io::ErrorKind::Unsupported,
        "stopping the proxy is only supported on Unix",
    )))
}

/// Incremental reader over an append-only log file.
///
/// Only complete lines are returned; a trailing partial line is held
/// until its newline arrives.
#[derive(Debug)]
pub struct LogCursor {
    path: PathBuf,
    offset: u64,
    partial: String,
}

impl LogCursor {
    pub fn at(path: &Path, offset: u64) -> Self {
        Self {
            path: path.to_path_buf(),
            offset,
            partial: String::new(),
        }
    }

    /// Cursor positioned at the current end of the file.
    pub fn at_end(path: &Path) -> Self {
        let offset = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        Self::at(path, offset)
    }

    pub fn poll(&mut self) -> io::Result<Vec<String>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        // Truncated underneath us: start over.
        if file.metadata()?.len() < self.offset {
            self.offset = 0;
            self.partial.clear();
        }

        file.seek(SeekFrom::Start(self.offset))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        self.offset += bytes.len() as u64;
        self.partial.push_str(&String::from_utf8_lossy(&bytes));

        let Some(last_newline) = self.partial.rfind('\n') else {
            return Ok(Vec::new());
        };
        let rest = self.partial.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.partial, rest);
        Ok(complete.lines().map(str::to_string).collect())
    }
}

/// The last `n` lines of a file.
pub fn tail_lines(path: &Path, n: usize) -> io::Result<Vec<String>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut tail = VecDeque::with_capacity(n);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        // Proxy output is not guaranteed to be UTF-8.
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']).to_string();
        if tail.len() == n {
            tail.pop_front();
        }
        if n > 0 {
            tail.push_back(line);
        }
    }
    Ok(tail.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn classify_readiness_and_failures() {
        assert_eq!(
            classify("INFO:     Uvicorn running on http://0.0.0.0:4000 (Press CTRL+C to quit)"),
            Some(LineSignal::Ready)
        );
        assert_eq!(
            classify("ERROR: Application startup failed. Exiting."),
            Some(LineSignal::Failure)
        );
        assert_eq!(classify("LiteLLM: Proxy initialized with Config"), None);
        assert_eq!(classify("error loading optional plugin"), None);
    }

    #[test]
    fn launch_args() {
        let spec = LaunchSpec {
            program: "litellm".to_string(),
            config: PathBuf::from("/c/config.yaml"),
            host: "0.0.0.0".to_string(),
            port: 4000,
            log_file: PathBuf::from("/c/freerouter.log"),
        };
        assert_eq!(
            spec.args(),
            ["--config", "/c/config.yaml", "--port", "4000", "--host", "0.0.0.0"]
        );
    }

    #[test]
    fn cursor_returns_only_complete_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.log");
        let mut file = File::create(&path).unwrap();
        write!(file, "one\ntw").unwrap();

        let mut cursor = LogCursor::at(&path, 0);
        assert_eq!(cursor.poll().unwrap(), ["one"]);
        assert!(cursor.poll().unwrap().is_empty());

        write!(file, "o\nthree\n").unwrap();
        assert_eq!(cursor.poll().unwrap(), ["two", "three"]);
    }

    #[test]
    fn cursor_at_end_skips_history_and_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.log");
        assert!(LogCursor::at_end(&path).poll().unwrap().is_empty());

        std::fs::write(&path, "old\n").unwrap();
        let mut cursor = LogCursor::at_end(&path);
        OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"new\n")
            .unwrap();
        assert_eq!(cursor.poll().unwrap(), ["new"]);
    }

    #[test]
    fn tail_keeps_last_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.log");
        std::fs::write(&path, "a\nb\nc\nd\n").unwrap();

        assert_eq!(tail_lines(&path, 2).unwrap(), ["c", "d"]);
        assert_eq!(tail_lines(&path, 10).unwrap().len(), 4);
        assert!(tail_lines(&path, 0).unwrap().is_empty());
    }

    #[test]
    fn tail_keeps_lines_with_invalid_utf8() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.log");
        std::fs::write(&path, b"ok\r\n\xff\xfebad\nend").unwrap();

        let lines = tail_lines(&path, 10).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "ok");
        assert!(lines[1].ends_with("bad"));
        assert!(lines[1].contains('\u{FFFD}'));
        assert_eq!(lines[2], "end");
    }

    #[test]
    fn missing_program_is_not_installed() {
        let dir = TempDir::new().unwrap();
        let spec = LaunchSpec {
            program: "freerouter-test-no-such-binary".to_string(),
            config: dir.path().join("config.yaml"),
            host: "127.0.0.1".to_string(),
            port: 4000,
            log_file: dir.path().join("freerouter.log"),
        };
        assert!(matches!(
            spawn(&spec),
            Err(SupervisorError::NotInstalled { .. })
        ));
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// A stand-in proxy: a shell script that receives the usual flags.
        fn fake_proxy(dir: &Path, body: &str) -> LaunchSpec {
            let script = dir.join("fake-proxy");
            std::fs::write(&script, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
            LaunchSpec {
                program: script.display().to_string(),
                config: dir.join("config.yaml"),
                host: "127.0.0.1".to_string(),
                port: 4999,
                log_file: dir.join("freerouter.log"),
            }
        }

        #[tokio::test]
        async fn ready_then_terminated() {
            let dir = TempDir::new().unwrap();
            let spec = fake_proxy(
                dir.path(),
                r#"echo "config=$2 env=${CONFIG_FILE_PATH:-unset}"
echo "INFO: Uvicorn running on http://$6:$4"
exec sleep 30"#,
            );

            let mut launched = spawn(&spec).unwrap();
            let mut seen = Vec::new();
            let readiness = wait_for_ready(&mut launched, &spec.log_file, Duration::from_secs(10), |l| {
                seen.push(l.to_string())
            })
            .await
            .unwrap();

            assert!(matches!(readiness, Readiness::Ready));
            assert!(seen[0].ends_with("env=unset"));
            assert!(seen[1].contains("http://127.0.0.1:4999"));

            // Reap in the background; an unreaped child still answers kill(pid, 0).
            let pid = launched.child.id();
            let mut child = launched.child;
            let reaper = std::thread::spawn(move || child.wait());

            let outcome = terminate(pid, Duration::from_secs(5)).await.unwrap();
            assert_eq!(outcome, StopOutcome::Terminated);
            reaper.join().unwrap().unwrap();
        }

        #[tokio::test]
        async fn failure_line_stops_the_wait() {
            let dir = TempDir::new().unwrap();
            let spec = fake_proxy(
                dir.path(),
                "echo 'ERROR: Application startup failed.'\nexec sleep 30",
            );

            let mut launched = spawn(&spec).unwrap();
            let readiness = wait_for_ready(&mut launched, &spec.log_file, Duration::from_secs(10), |_| {})
                .await
                .unwrap();
            assert!(matches!(readiness, Readiness::Failed(line) if line.contains("startup failed")));

            let _ = launched.child.kill();
            let _ = launched.child.wait();
        }

        #[tokio::test]
        async fn early_exit_is_reported() {
            let dir = TempDir::new().unwrap();
            let spec = fake_proxy(dir.path(), "echo 'bad flag'\nexit 3");

            let mut launched = spawn(&spec).unwrap();
            let readiness = wait_for_ready(&mut launched, &spec.log_file, Duration::from_secs(10), |_| {})
                .await
                .unwrap();
            assert!(matches!(readiness, Readiness::Exited(status) if status.code() == Some(3)));
        }

        #[tokio::test]
        async fn stubborn_process_is_killed() {
            let dir = TempDir::new().unwrap();
            let spec = fake_proxy(
                dir.path(),
                "trap '' TERM\necho 'INFO: Uvicorn running on http://x'\nwhile true; do sleep 1; done",
            );

            let mut launched = spawn(&spec).unwrap();
            wait_for_ready(&mut launched, &spec.log_file, Duration::from_secs(10), |_| {})
                .await
                .unwrap();

            let pid = launched.child.id();
            let mut child = launched.child;
            let reaper = std::thread::spawn(move || child.wait());

            let outcome = terminate(pid, Duration::from_millis(300)).await.unwrap();
            assert_eq!(outcome, StopOutcome::Killed);
            reaper.join().unwrap().unwrap();
        }
    }
}
