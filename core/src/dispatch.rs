//! Dispatch loop tying the watcher to its outputs.

use std::sync::Arc;

use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::WatchConfig;
use crate::format::format_message;
use crate::operation::Operation;
use crate::server::BroadcastServer;
use crate::trigger::CommandTrigger;
use crate::watcher::RecursiveWatcher;

/// What happened to one dispatched operation.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Number of clients the message reached, when it was broadcast.
    pub delivered: Option<usize>,

    /// Handle of the command started for this operation, if any.
    pub command: Option<JoinHandle<()>>,
}

/// Routes each operation to the broadcast server and the command trigger.
pub struct Dispatcher<C = TcpStream> {
    server: Option<Arc<BroadcastServer<C>>>,
    format: String,
    trigger: Option<CommandTrigger>,
}

impl<C> Dispatcher<C>
where
    C: AsyncWrite + Unpin + Send,
{
    /// Create a dispatcher with no outputs.
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            server: None,
            format: format.into(),
            trigger: None,
        }
    }

    /// Wire the outputs enabled in the configuration.
    pub fn from_config(config: &WatchConfig, server: Arc<BroadcastServer<C>>) -> Self {
        let mut dispatcher = Self::new(config.server_format.clone());

        if config.server_addr().is_some() {
            dispatcher = dispatcher.with_server(server);
        }

        if let Some(command) = config.reactive_command() {
            dispatcher = dispatcher.with_trigger(CommandTrigger::new(command));
        }

        dispatcher
    }

    pub fn with_server(mut self, server: Arc<BroadcastServer<C>>) -> Self {
        self.server = Some(server);
        self
    }

    pub fn with_trigger(mut self, trigger: CommandTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Broadcast and trigger for a single operation.
    pub async fn dispatch(&self, op: &Operation) -> DispatchReport {
        info!("Operation: {} {}", op.kind(), op.path.display());
        debug!("Observed at {}", op.timestamp.to_rfc3339());
        let mut report = DispatchReport::default();

        if let Some(server) = &self.server {
            match format_message(op, &self.format) {
                Ok(raw) => {
                    debug!("Raw message: {}", String::from_utf8_lossy(&raw));
                    report.delivered = Some(server.send_message(&raw).await);
                }
                Err(e) => error!("Not broadcasting {}: {e}", op.path.display()),
            }
        }

        if let Some(trigger) = &self.trigger {
            report.command = trigger.fire();
        }

        report
    }

    /// Dispatch every operation until the watcher is closed.
    pub async fn run(&self, watcher: &mut RecursiveWatcher) {
        while let Some(op) = watcher.next().await {
            self.dispatch(&op).await;
        }

        debug!("Watcher closed, dispatch loop finished");
    }
}
