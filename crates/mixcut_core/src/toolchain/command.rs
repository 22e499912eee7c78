//! Synchronous subprocess runner with a hard timeout.
//!
//! The engine's scheduling model is blocking: the calling thread waits for
//! the child for at most the configured timeout, then kills it. A timeout
//! is reported the same way as a nonzero exit so callers treat both as
//! "this path failed".

use std::ffi::OsString;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Poll interval while waiting for the child to exit.
const WAIT_POLL: Duration = Duration::from_millis(50);

/// Errors from running an external tool.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The tool binary could not be spawned.
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// The tool ran past its deadline and was killed.
    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    /// The tool exited with a nonzero status.
    #[error("{tool} exited with code {code}: {stderr}")]
    NonZeroExit {
        tool: String,
        code: i32,
        stderr: String,
    },

    /// The tool claimed success but its declared output is missing or empty.
    #[error("declared output missing or empty: {path}")]
    OutputMissing { path: PathBuf },

    /// I/O error while driving the child process.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

/// Result type for toolchain operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Captured output of a successful tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// Builder for a single tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<OsString>,
    timeout: Duration,
}

impl ToolCommand {
    /// Create a command for the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(300),
        }
    }

    /// Append a single argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append multiple arguments.
    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the command, capturing stdout and stderr.
    ///
    /// Blocks until the child exits or the deadline passes. At the
    /// deadline the child is killed and `ToolError::Timeout` is returned.
    pub fn run(&self) -> ToolResult<ToolOutput> {
        tracing::debug!("running: {} {:?}", self.program, self.args);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ToolError::Spawn {
                tool: self.program.clone(),
                source: e,
            })?;

        // Drain pipes on reader threads so a chatty child can't deadlock
        // against a full pipe buffer while we poll for exit.
        let stdout_handle = spawn_reader(child.stdout.take());
        let stderr_handle = spawn_reader(child.stderr.take());

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        join_reader(stdout_handle);
                        join_reader(stderr_handle);
                        return Err(ToolError::Timeout {
                            tool: self.program.clone(),
                            secs: self.timeout.as_secs(),
                        });
                    }
                    thread::sleep(WAIT_POLL);
                }
                Err(e) => {
                    let _ = child.kill();
                    return Err(ToolError::Io {
                        operation: format!("waiting for {}", self.program),
                        source: e,
                    });
                }
            }
        };

        let stdout = join_reader(stdout_handle);
        let stderr = join_reader(stderr_handle);

        if !status.success() {
            return Err(ToolError::NonZeroExit {
                tool: self.program.clone(),
                code: status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(ToolOutput { stdout, stderr })
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    source: Option<R>,
) -> Option<thread::JoinHandle<String>> {
    source.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join_reader(handle: Option<thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}
