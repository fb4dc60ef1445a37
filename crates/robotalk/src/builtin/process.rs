//! Managed child process used by the built-in component types

use indexmap::IndexMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::component::ComponentError;

/// Default grace period between SIGTERM and SIGKILL
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Process status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Process has not been started
    Pending,
    /// Process is running
    Running,
    /// Process has exited with exit code (`None` when killed by a signal)
    Stopped(Option<i32>),
    /// Process failed to start
    Failed,
}

impl ProcessStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ProcessStatus::Running)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, ProcessStatus::Stopped(_) | ProcessStatus::Failed)
    }
}

/// Configuration for spawning a process
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Process name (for logging)
    pub name: String,
    /// Executable path
    pub executable: String,
    /// Command line arguments
    pub args: Vec<String>,
    /// Extra environment variables on top of the inherited environment
    pub env: IndexMap<String, String>,
    /// Working directory
    pub working_dir: Option<PathBuf>,
    /// How long `stop` waits after SIGTERM before killing
    pub stop_timeout: Duration,
}

impl ProcessConfig {
    pub fn new(name: impl Into<String>, executable: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            executable: executable.into(),
            args: Vec::new(),
            env: IndexMap::new(),
            working_dir: None,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

struct ProcessState {
    status: ProcessStatus,
    pid: Option<u32>,
    child: Option<Child>,
}

/// A child process that can be started and stopped through a shared
/// reference.
pub struct ManagedProcess {
    config: ProcessConfig,
    state: Mutex<ProcessState>,
}

impl ManagedProcess {
    pub fn new(config: ProcessConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ProcessState {
                status: ProcessStatus::Pending,
                pid: None,
                child: None,
            }),
        }
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// Spawn the process and forward its output to the log; returns the pid
    pub async fn start(&self) -> Result<u32, ProcessError> {
        let mut state = self.state.lock().await;
        if state.status.is_running() {
            return Err(ProcessError::AlreadyRunning(self.config.name.clone()));
        }

        log::info!(
            "[{}] Starting: {} {}",
            self.config.name,
            self.config.executable,
            self.config.args.join(" ")
        );

        let mut cmd = Command::new(&self.config.executable);
        cmd.args(&self.config.args)
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                state.status = ProcessStatus::Failed;
                log::error!("[{}] Failed to spawn process: {}", self.config.name, e);
                return Err(ProcessError::SpawnFailed {
                    name: self.config.name.clone(),
                    source: e,
                });
            }
        };

        let Some(pid) = child.id() else {
            state.status = ProcessStatus::Failed;
            log::error!("[{}] Process has no pid after spawn", self.config.name);
            return Err(ProcessError::NoPid(self.config.name.clone()));
        };
        if let Some(stdout) = child.stdout.take() {
            forward_lines(self.config.name.clone(), stdout, false);
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(self.config.name.clone(), stderr, true);
        }

        log::info!("[{}] Process started with PID: {}", self.config.name, pid);
        state.status = ProcessStatus::Running;
        state.pid = Some(pid);
        state.child = Some(child);
        Ok(pid)
    }

    /// Stop the process gracefully (SIGTERM, then SIGKILL after the stop
    /// timeout) and return its exit code.
    ///
    /// Stopping a process that is not running is a no-op.
    pub async fn stop(&self) -> Result<Option<i32>, ProcessError> {
        let mut state = self.state.lock().await;
        let Some(mut child) = state.child.take() else {
            return Ok(None);
        };
        log::info!("[{}] Stopping process...", self.config.name);

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = state.pid.and_then(signal_target) {
                if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
                    log::debug!("[{}] SIGTERM failed: {}", self.config.name, e);
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = child.start_kill();
        }

        let wait_error = |source| ProcessError::Wait {
            name: self.config.name.clone(),
            source,
        };

        let status = match tokio::time::timeout(self.config.stop_timeout, child.wait()).await {
            Ok(status) => status.map_err(wait_error)?,
            Err(_) => {
                log::warn!(
                    "[{}] Process did not exit gracefully, forcing kill",
                    self.config.name
                );
                child.kill().await.map_err(wait_error)?;
                child.wait().await.map_err(wait_error)?
            }
        };

        let code = status.code();
        log::info!("[{}] Process exited with code: {:?}", self.config.name, code);
        state.status = ProcessStatus::Stopped(code);
        state.pid = None;
        Ok(code)
    }

    /// Current status, noticing processes that exited on their own
    pub async fn status(&self) -> ProcessStatus {
        let mut state = self.state.lock().await;
        let exited = match state.child.as_mut().map(Child::try_wait) {
            Some(Ok(Some(status))) => Some(status.code()),
            Some(Err(e)) => {
                log::error!("[{}] Error checking process status: {}", self.config.name, e);
                None
            }
            _ => None,
        };
        if let Some(code) = exited {
            log::info!("[{}] Process exited with code: {:?}", self.config.name, code);
            state.status = ProcessStatus::Stopped(code);
            state.pid = None;
            state.child = None;
        }
        state.status
    }

    /// Process ID while running
    pub async fn pid(&self) -> Option<u32> {
        self.state.lock().await.pid
    }
}

fn forward_lines<R>(name: String, stream: R, is_stderr: bool)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if is_stderr {
                log::warn!("[{}] {}", name, line);
            } else {
                log::info!("[{}] {}", name, line);
            }
        }
    });
}

/// Errors that can occur with managed processes
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Process '{0}' is already running")]
    AlreadyRunning(String),

    #[error("Failed to spawn process '{name}': {source}")]
    SpawnFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process '{0}' has no pid after spawn")]
    NoPid(String),

    #[error("Failed waiting for process '{name}': {source}")]
    Wait {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Raw pid to signal. Zero and values that do not fit a positive `pid_t`
/// would address a process group, so they are never signalled.
#[cfg(unix)]
fn signal_target(pid: u32) -> Option<i32> {
    i32::try_from(pid).ok().filter(|pid| *pid > 0)
}

impl From<ProcessError> for ComponentError {
    fn from(err: ProcessError) -> Self {
        ComponentError::Runtime(err.to_string())
    }
}
