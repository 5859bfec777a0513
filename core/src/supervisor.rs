//! Companion process supervision.
//!
//! Keeps one auxiliary command alive for the lifetime of the watcher,
//! restarting it after a fixed delay whenever it exits.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::WatchConfig;
use crate::error::{Result, WatchError};
use crate::shell::shell_command;

/// Delay between an exit and the next start.
pub const RESTART_DELAY: Duration = Duration::from_secs(2);

/// How long output forwarding may lag behind the child's exit.
///
/// Background processes left by the child can hold its pipes open forever;
/// forwarding is abandoned after this.
pub const OUTPUT_GRACE: Duration = Duration::from_millis(200);

/// Restarts a long-lived command whenever it exits.
#[derive(Debug, Clone)]
pub struct CompanionSupervisor {
    command: String,
    restart_delay: Duration,
}

impl CompanionSupervisor {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            restart_delay: RESTART_DELAY,
        }
    }

    /// Build a supervisor when a companion command is configured.
    pub fn from_config(config: &WatchConfig) -> Option<Self> {
        config.companion_command().map(Self::new)
    }

    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Run the command forever.
    ///
    /// Exits of the child, whatever their status, lead to a restart. Only a
    /// failure to start the child is returned.
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.run_once().await? {
                Some(status) => info!("Parallel command exited with {status}"),
                None => warn!("Lost track of parallel command"),
            }

            info!(
                "Starting a new parallel command in {}ms",
                self.restart_delay.as_millis()
            );
            tokio::time::sleep(self.restart_delay).await;
        }
    }

    /// Start the child, stream its output and wait for it to exit.
    async fn run_once(&self) -> Result<Option<ExitStatus>> {
        info!("Running command: {}", self.command);

        let mut child = shell_command(&self.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| WatchError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        let copies = [
            child.stdout.take().map(forward_to_stdout),
            child.stderr.take().map(forward_to_stdout),
        ];

        let status = match child.wait().await {
            Ok(status) => Some(status),
            Err(e) => {
                warn!("Failed waiting for parallel command: {e}");
                None
            }
        };

        for mut copy in copies.into_iter().flatten() {
            match tokio::time::timeout(OUTPUT_GRACE, &mut copy).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Parallel command output forwarding failed: {e}"),
                Err(_) => {
                    debug!("Parallel command output still open after exit, detaching");
                    copy.abort();
                }
            }
        }

        Ok(status)
    }
}

/// Copy a child stream verbatim to our stdout until it closes.
fn forward_to_stdout<R>(mut reader: R) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        if let Err(e) = tokio::io::copy(&mut reader, &mut stdout).await {
            warn!("Failed forwarding parallel command output: {e}");
        }
    })
}

/// Supervise the configured companion command, if any.
pub async fn run_companion(config: &WatchConfig) -> Result<()> {
    match CompanionSupervisor::from_config(config) {
        Some(supervisor) => supervisor.run().await,
        None => Ok(()),
    }
}
