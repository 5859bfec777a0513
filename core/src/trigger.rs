//! Single-flight command trigger.
//!
//! Each qualifying event may start the configured command. While an
//! invocation is in flight, further events are dropped rather than queued.

use std::io::Read;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::shell::shell_command;

/// Result of one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Whether the command exited successfully.
    pub success: bool,

    /// Exit code, if the command was not killed by a signal.
    pub status: Option<i32>,

    /// Standard output and standard error, interleaved as written.
    pub output: String,

    /// Execution time in milliseconds.
    pub duration_ms: u64,
}

/// Runs a command to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str) -> Result<CommandOutput>;
}

/// Runs commands through the host shell, capturing their output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        let start = Instant::now();

        // Both streams share one pipe so their writes keep their order.
        let (mut reader, writer) = std::io::pipe()?;
        let mut cmd = shell_command(command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(writer.try_clone()?))
            .stderr(Stdio::from(writer));
        let mut child = cmd.spawn()?;
        // The command holds our copies of the write end; the read only ends
        // once every writer is gone.
        drop(cmd);

        let collect = tokio::task::spawn_blocking(move || {
            let mut raw = Vec::new();
            reader.read_to_end(&mut raw).map(|_| raw)
        });

        let status = child.wait().await?;
        let raw = collect.await.map_err(std::io::Error::other)??;

        Ok(CommandOutput {
            success: status.success(),
            status: status.code(),
            output: String::from_utf8_lossy(&raw).into_owned(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Starts the configured command at most once at a time.
pub struct CommandTrigger {
    command: String,
    running: Arc<AtomicBool>,
    runner: Arc<dyn CommandRunner>,
}

impl CommandTrigger {
    /// Create a trigger running `command` through the host shell.
    pub fn new(command: impl Into<String>) -> Self {
        Self::with_runner(command, Arc::new(ShellRunner))
    }

    pub fn with_runner(command: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            command: command.into(),
            running: Arc::new(AtomicBool::new(false)),
            runner,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Whether an invocation is in flight.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start the command unless one is already running.
    ///
    /// Never blocks. Returns the handle of the started invocation, or `None`
    /// when the event was dropped.
    pub fn fire(&self) -> Option<JoinHandle<()>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("SKIPPING: command already running: {}", self.command);
            return None;
        }

        let busy = BusyGuard(Arc::clone(&self.running));
        let runner = Arc::clone(&self.runner);
        let command = self.command.clone();

        Some(tokio::spawn(async move {
            let _busy = busy;
            debug!("Running command: {command}");

            match runner.run(&command).await {
                Ok(out) => {
                    if !out.success {
                        warn!("Fail to run the command: {command} exited with {:?}", out.status);
                    }
                    info!("Output command ({}ms)\n{}", out.duration_ms, out.output);
                }
                Err(e) => warn!("Fail to run the command: {command}: {e}"),
            }
        }))
    }
}

/// Clears the busy flag when the invocation finishes, even on panic.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
