//! Line-oriented stdio channel to a child process.
//!
//! `ProcessChannel` owns the child and both ends of its stdio. It knows
//! nothing about JSON-RPC; it only moves lines.
//!
//! ## Lifecycle
//! 1. `start` spawns the process (no-op while it is alive)
//! 2. `send` / `receive_line` exchange lines
//! 3. `stop` closes stdin, waits out a grace period, then kills
//!
//! Dropping the channel kills the child, so an owner that unwinds on an
//! error path never leaves an orphan process behind.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Result, RpcError};

/// How to launch a backend process.
///
/// Connection parameters (host, port, credentials) travel as environment
/// variables layered on top of the inherited environment.
#[derive(Debug, Clone, Default)]
pub struct ProcessSpec {
    /// Backend name used in logs and metrics (e.g. "vertica").
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl ProcessSpec {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    /// Append one argument (builder pattern).
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set one environment variable for the child (builder pattern).
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Command line for logging. Environment values are left out because
    /// they usually carry credentials.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// Owns one child process and its stdio pipes.
pub struct ProcessChannel {
    name: String,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<Lines<BufReader<ChildStdout>>>,
    stderr_drain: Option<JoinHandle<()>>,
    /// Set once stdout hit end-of-stream or stdin refused a write.
    broken: bool,
    /// Set while a line is being written. Still set after a cancelled
    /// `send`, when stdin may hold half a request.
    mid_write: bool,
}

impl ProcessChannel {
    /// Create an idle channel. Nothing is spawned until `start`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            child: None,
            stdin: None,
            stdout: None,
            stderr_drain: None,
            broken: false,
            mid_write: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// OS process id of the current child, if one is running.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|child| child.id())
    }

    /// Spawn the process described by `spec`.
    ///
    /// Idempotent: returns immediately while the current child is alive.
    /// Leftovers of a dead child are cleared before the new spawn.
    pub async fn start(&mut self, spec: &ProcessSpec) -> Result<()> {
        if self.is_alive() {
            debug!(backend = %self.name, "process already running");
            return Ok(());
        }
        self.release();

        info!(backend = %self.name, "Starting backend process: {}", spec.display());

        let mut child = Command::new(&spec.command)
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RpcError::Spawn {
                command: spec.command.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        // Stash the child first so a missing pipe below still gets it killed.
        self.child = Some(child);

        let (Some(stdin), Some(stdout), Some(stderr)) = (stdin, stdout, stderr) else {
            self.release();
            return Err(RpcError::closed("child stdio was not captured"));
        };

        self.stdin = Some(stdin);
        self.stdout = Some(BufReader::new(stdout).lines());
        self.stderr_drain = Some(spawn_stderr_drain(self.name.clone(), stderr));
        self.broken = false;
        self.mid_write = false;

        info!(backend = %self.name, pid = ?self.pid(), "Backend process started");
        Ok(())
    }

    /// Write one line and flush it.
    ///
    /// If the future is dropped before the flush completes the channel
    /// reports itself dead, so the next `start` respawns the process.
    pub async fn send(&mut self, line: &str) -> Result<()> {
        if !self.is_alive() {
            return Err(RpcError::closed("process is not running"));
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(RpcError::closed("stdin is closed"));
        };

        self.mid_write = true;
        let written = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        }
        .await;
        self.mid_write = false;

        written.map_err(|e| {
            if is_pipe_closed(&e) {
                self.broken = true;
                RpcError::closed(format!("write failed: {}", e))
            } else {
                RpcError::Io(e)
            }
        })
    }

    /// Wait up to `timeout` for one line from stdout.
    pub async fn receive_line(&mut self, timeout: Duration) -> Result<String> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Err(RpcError::closed("stdout is closed"));
        };

        match tokio::time::timeout(timeout, stdout.next_line()).await {
            Err(_) => Err(RpcError::Timeout(timeout)),
            Ok(Ok(Some(line))) => Ok(line),
            Ok(Ok(None)) => {
                self.broken = true;
                Err(RpcError::closed("end of stream"))
            }
            Ok(Err(e)) => Err(RpcError::Io(e)),
        }
    }

    /// Liveness probe: the child has not exited and its pipes still work.
    pub fn is_alive(&mut self) -> bool {
        if self.broken || self.mid_write {
            return false;
        }
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Close stdio, wait up to `grace` for a clean exit, then force-kill.
    pub async fn stop(&mut self, grace: Duration) {
        // Closing stdin is the shutdown signal for stdio servers.
        self.stdin = None;
        self.stdout = None;

        if let Some(mut child) = self.child.take() {
            info!(backend = %self.name, "Stopping backend process");
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(Ok(status)) => {
                    info!(backend = %self.name, %status, "Backend process stopped");
                }
                Ok(Err(e)) => {
                    warn!(backend = %self.name, "Error waiting for backend process: {}", e);
                    let _ = child.kill().await;
                }
                Err(_) => {
                    warn!(
                        backend = %self.name,
                        "Backend process did not exit within {:?}, killing it",
                        grace
                    );
                    if let Err(e) = child.kill().await {
                        warn!(backend = %self.name, "Failed to kill backend process: {}", e);
                    }
                }
            }
        }

        if let Some(drain) = self.stderr_drain.take() {
            drain.abort();
        }
        self.broken = false;
        self.mid_write = false;
    }

    /// Drop every handle without waiting. The child is killed on drop.
    fn release(&mut self) {
        self.stdin = None;
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
        }
        if let Some(drain) = self.stderr_drain.take() {
            drain.abort();
        }
        self.broken = false;
        self.mid_write = false;
    }
}

impl Drop for ProcessChannel {
    fn drop(&mut self) {
        self.release();
    }
}

/// Forward every stderr line to the log so the child never blocks on a
/// full pipe. Never touches protocol state.
///
/// Lines are read as raw bytes: a backend printing invalid UTF-8 must not
/// stop the drain, or its next stderr write fails on a closed pipe.
fn spawn_stderr_drain(name: String, stderr: tokio::process::ChildStderr) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    warn!(backend = %name, "stderr: {}", line.trim_end());
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(backend = %name, "stderr drain stopped: {}", e);
                    break;
                }
            }
        }
    })
}

fn is_pipe_closed(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::UnexpectedEof
    )
}
