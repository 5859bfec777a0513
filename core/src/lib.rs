//! # fswatch core
//!
//! Watches a directory tree and reacts to its changes by broadcasting a
//! notification to connected TCP clients and/or running a shell command,
//! while keeping an optional companion process alive.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         fswatch core                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  RecursiveWatcher ──► EventFilter ──► Operation                 │
//! │                                          │                      │
//! │                                          ▼                      │
//! │                                      Dispatcher                 │
//! │                                     │         │                 │
//! │                          format_message   CommandTrigger        │
//! │                                     │                           │
//! │                                     ▼                           │
//! │                             BroadcastServer                     │
//! │                                                                 │
//! │  CompanionSupervisor (independent restart loop)                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod format;
pub mod operation;
pub mod server;
pub mod shell;
pub mod supervisor;
pub mod trigger;
pub mod watcher;

pub use config::WatchConfig;
pub use dispatch::{DispatchReport, Dispatcher};
pub use error::{Result, WatchError};
pub use filter::{Decision, EventFilter};
pub use format::{ServerFormat, format_message};
pub use operation::{BroadcastKind, Operation, OperationKind, RawKind};
pub use server::{BroadcastServer, start_server};
pub use supervisor::{CompanionSupervisor, run_companion};
pub use trigger::{CommandOutput, CommandRunner, CommandTrigger, ShellRunner};
pub use watcher::RecursiveWatcher;
