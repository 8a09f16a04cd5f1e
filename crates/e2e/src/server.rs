//! Server lifecycle - reusing or spawning the example server for a session

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::error::{E2eError, E2eResult};
use crate::poll::{poll_until, DEFAULT_POLL_INTERVAL};
use crate::probe::{probe, DEFAULT_PROBE_TIMEOUT};

/// Port the example server listens on for test sessions
pub const DEFAULT_PORT: u16 = 5566;

/// Host the fixture probes and the browser connects to
pub const DEFAULT_HOST: &str = "localhost";

/// Lines of server stderr kept for startup diagnostics
const STDERR_TAIL_LINES: usize = 50;

/// Configuration for acquiring a server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to probe and build URLs with
    pub host: String,

    /// Port to probe and, if nothing listens, to spawn on
    pub port: u16,

    /// Repository root; the spawned server runs from here
    pub repo_root: PathBuf,

    /// Server binary, relative to `repo_root` unless absolute
    pub entry_point: PathBuf,

    /// Site directory passed as `--root`, relative to `repo_root` unless absolute
    pub site_root: PathBuf,

    /// Connect timeout for the liveness probe
    pub probe_timeout: Duration,

    /// How long a spawned server gets to start answering
    pub startup_timeout: Duration,

    /// How long a spawned server gets to exit after SIGTERM
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            repo_root: default_repo_root(),
            entry_point: PathBuf::from(format!(
                "target/debug/tutorial-serve{}",
                std::env::consts::EXE_SUFFIX
            )),
            site_root: PathBuf::from("tutorial"),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            startup_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn entry_point_path(&self) -> PathBuf {
        self.under_root(&self.entry_point)
    }

    pub fn site_root_path(&self) -> PathBuf {
        self.under_root(&self.site_root)
    }

    fn under_root(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.repo_root.join(path)
        }
    }

    /// Everything a spawn needs must exist up front, so a broken setup fails
    /// the session here instead of as a startup timeout.
    pub fn check_preconditions(&self) -> E2eResult<()> {
        let entry = self.entry_point_path();
        if !entry.is_file() {
            return Err(E2eError::EntryPointMissing(entry));
        }
        let site = self.site_root_path();
        if !site.is_dir() {
            return Err(E2eError::SiteRootMissing(site));
        }
        Ok(())
    }
}

/// Workspace root derived from this crate's manifest directory
pub fn default_repo_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Handle to the session's server
///
/// Owned handles terminate their process on release; handles to a server
/// that was already running never touch it.
pub struct ServerHandle {
    process: Option<ServerProcess>,
    base_url: String,
    port: u16,
    shutdown_timeout: Duration,
}

impl ServerHandle {
    /// Reuse a listening server or spawn one and wait until it answers
    pub async fn acquire(config: &ServerConfig) -> E2eResult<Self> {
        let base_url = config.base_url();

        if probe(&config.host, config.port, config.probe_timeout).await {
            info!("Server already listening at {}; reusing it", base_url);
            return Ok(Self {
                process: None,
                base_url,
                port: config.port,
                shutdown_timeout: config.shutdown_timeout,
            });
        }

        config.check_preconditions()?;

        let entry = config.entry_point_path();
        info!("Spawning {} on port {}", entry.display(), config.port);

        let mut cmd = Command::new(&entry);
        cmd.arg("--port")
            .arg(config.port.to_string())
            .arg("--root")
            .arg(config.site_root_path())
            .current_dir(&config.repo_root);

        let process = ServerProcess::spawn(cmd)?;
        let mut handle = Self {
            process: Some(process),
            base_url,
            port: config.port,
            shutdown_timeout: config.shutdown_timeout,
        };

        // On failure the handle drops here and the child is reaped.
        handle.wait_until_ready(config.startup_timeout).await?;

        info!("Server is ready at {}", handle.base_url);
        Ok(handle)
    }

    /// Poll the index page until it answers, failing early if the child dies
    async fn wait_until_ready(&mut self, limit: Duration) -> E2eResult<()> {
        let Some(process) = self.process.as_mut() else {
            return Ok(());
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;
        let index_url = format!("{}/", self.base_url);
        let mut attempts = 0usize;

        poll_until("server readiness", limit, DEFAULT_POLL_INTERVAL * 2, || {
            attempts += 1;
            let first = attempts == 1;
            let exited = process.child.try_wait();
            let stderr_tail = process.stderr_tail();
            let request = client.get(&index_url).send();

            async move {
                match exited {
                    Err(e) => return Err(E2eError::Io(e)),
                    Ok(Some(status)) => {
                        return Err(E2eError::ServerExited {
                            status: status.to_string(),
                            stderr: stderr_tail,
                        })
                    }
                    Ok(None) => {}
                }

                match request.await {
                    Ok(resp) if resp.status().is_success() => Ok(Some(())),
                    Ok(resp) => {
                        warn!("Readiness check returned {}", resp.status());
                        Ok(None)
                    }
                    Err(e) => {
                        if first {
                            info!("Waiting for server to start...");
                        }
                        // Connection refused is expected while the server binds
                        if !e.is_connect() {
                            debug!("Readiness check error: {}", e);
                        }
                        Ok(None)
                    }
                }
            }
        })
        .await
        .map_err(|e| match e {
            E2eError::Timeout(what) => {
                E2eError::ServerStartup(format!("no answer from {} within {}", index_url, what))
            }
            other => other,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether this session spawned the server
    pub fn is_owned(&self) -> bool {
        self.process.is_some()
    }

    /// Process id of an owned server
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(|p| p.child.id())
    }

    /// Terminate an owned server and wait for it; no-op otherwise.
    ///
    /// Failures are logged, never returned: teardown must not fail a session
    /// whose scenarios already ran.
    pub fn release(&mut self) {
        match self.process.take() {
            Some(process) => process.terminate(self.shutdown_timeout),
            None => debug!(
                "Server at {} was already running; leaving it up",
                self.base_url
            ),
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// A spawned server with its output drained in the background
struct ServerProcess {
    child: Child,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
    drains: Vec<JoinHandle<()>>,
}

impl ServerProcess {
    fn spawn(mut cmd: Command) -> E2eResult<Self> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let program = cmd.get_program().to_string_lossy().into_owned();
        let mut child = cmd
            .spawn()
            .map_err(|e| E2eError::ServerStartup(format!("failed to spawn {}: {}", program, e)))?;

        let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let mut drains = Vec::new();

        if let Some(stdout) = child.stdout.take() {
            drains.push(std::thread::spawn(move || {
                drain_lines(stdout, |line| trace!(target: "tutorial_serve", "{}", line))
            }));
        }
        if let Some(stderr) = child.stderr.take() {
            let tail = stderr_tail.clone();
            drains.push(std::thread::spawn(move || {
                drain_lines(stderr, |line| {
                    debug!(target: "tutorial_serve", "{}", line);
                    if let Ok(mut tail) = tail.lock() {
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line.to_string());
                    }
                })
            }));
        }

        Ok(Self {
            child,
            stderr_tail,
            drains,
        })
    }

    fn stderr_tail(&self) -> String {
        self.stderr_tail
            .lock()
            .map(|tail| tail.iter().cloned().collect::<Vec<_>>().join("\n"))
            .unwrap_or_default()
    }

    fn terminate(mut self, grace: Duration) {
        let pid = self.child.id();
        if let Ok(Some(status)) = self.child.try_wait() {
            debug!("Server (pid: {}) already exited with {}", pid, status);
            self.join_drains();
            return;
        }
        info!("Stopping server (pid: {})", pid);

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                warn!("Failed to send SIGTERM to server (pid: {}): {}", pid, e);
            }
        }
        #[cfg(not(unix))]
        {
            if let Err(e) = self.child.kill() {
                warn!("Failed to kill server (pid: {}): {}", pid, e);
            }
        }

        let deadline = Instant::now() + grace;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    debug!("Server (pid: {}) exited with {}", pid, status);
                    break;
                }
                Ok(None) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(50));
                }
                Ok(None) => {
                    warn!("Server (pid: {}) ignored SIGTERM for {:?}; killing it", pid, grace);
                    self.force_kill();
                    break;
                }
                Err(e) => {
                    warn!("Failed to query server (pid: {}): {}", pid, e);
                    self.force_kill();
                    break;
                }
            }
        }

        self.join_drains();
    }

    fn join_drains(&mut self) {
        for drain in self.drains.drain(..) {
            if drain.join().is_err() {
                warn!("Server output reader panicked");
            }
        }
    }

    fn force_kill(&mut self) {
        if let Err(e) = self.child.kill() {
            warn!("Failed to kill server: {}", e);
        }
        if let Err(e) = self.child.wait() {
            warn!("Failed to reap server: {}", e);
        }
    }
}

fn drain_lines(stream: impl Read, mut on_line: impl FnMut(&str)) {
    for line in BufReader::new(stream).lines() {
        match line {
            Ok(line) => on_line(&line),
            Err(_) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    fn config_for(port: u16, repo_root: &Path) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port,
            repo_root: repo_root.to_path_buf(),
            startup_timeout: Duration::from_secs(10),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 5566);
        assert_eq!(config.base_url(), "http://localhost:5566");
        assert!(config.entry_point_path().starts_with(&config.repo_root));
        assert!(config.repo_root.join("crates/e2e/Cargo.toml").is_file());
    }

    #[tokio::test]
    async fn test_existing_listener_is_reused_and_left_running() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let dir = tempfile::tempdir().unwrap();

        let mut handle = ServerHandle::acquire(&config_for(port, dir.path()))
            .await
            .unwrap();
        assert!(!handle.is_owned());
        assert_eq!(handle.pid(), None);
        assert_eq!(handle.base_url(), format!("http://127.0.0.1:{}", port));

        handle.release();
        drop(handle);

        assert!(probe("127.0.0.1", port, DEFAULT_PROBE_TIMEOUT).await);
    }

    #[tokio::test]
    async fn test_missing_entry_point_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            entry_point: PathBuf::from("target/debug/does-not-exist"),
            ..config_for(free_port(), dir.path())
        };

        let err = ServerHandle::acquire(&config).await.err().unwrap();
        assert!(matches!(err, E2eError::EntryPointMissing(_)));
        assert!(err.is_server_startup());
    }

    #[tokio::test]
    async fn test_missing_site_root_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("serve"), "").unwrap();
        let config = ServerConfig {
            entry_point: PathBuf::from("serve"),
            site_root: PathBuf::from("nope"),
            ..config_for(free_port(), dir.path())
        };

        let err = ServerHandle::acquire(&config).await.err().unwrap();
        assert!(matches!(err, E2eError::SiteRootMissing(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_entry_point_that_exits_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("site")).unwrap();
        let config = ServerConfig {
            // sh rejects `--port` and exits straight away
            entry_point: PathBuf::from("/bin/sh"),
            site_root: PathBuf::from("site"),
            ..config_for(free_port(), dir.path())
        };

        let err = ServerHandle::acquire(&config).await.err().unwrap();
        assert!(
            matches!(err, E2eError::ServerExited { .. }),
            "unexpected error: {}",
            err
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_release_reaps_owned_process() {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        let mut handle = ServerHandle {
            process: Some(ServerProcess::spawn(cmd).unwrap()),
            base_url: "http://127.0.0.1:0".to_string(),
            port: 0,
            shutdown_timeout: Duration::from_secs(5),
        };
        assert!(handle.is_owned());
        let pid = Pid::from_raw(handle.pid().unwrap() as i32);

        handle.release();

        assert!(!handle.is_owned());
        // Reaped: the pid no longer names a process of ours
        assert!(kill(pid, None).is_err());

        // A second release is a no-op
        handle.release();
    }
}
