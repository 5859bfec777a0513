//! Configuration record shared by every component.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WatchError};
use crate::filter::{DEFAULT_EXCLUDE, DEFAULT_INCLUDE, EventFilter};
use crate::format::GO_JSON;

/// Default number of simultaneously connected broadcast clients.
pub const DEFAULT_MAX_CONNECTIONS: usize = 8;

/// Fully resolved configuration, immutable once the pipeline starts.
///
/// Keys are written in snake_case; the PascalCase spelling of older
/// configuration files is accepted on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Root of the watched tree.
    #[serde(alias = "Path")]
    pub path: PathBuf,

    /// Display verbose information.
    #[serde(alias = "Verbose")]
    pub verbose: bool,

    /// Listen address of the broadcast server; disabled when empty.
    #[serde(alias = "Server")]
    pub server: Option<String>,

    /// Command run in reaction to a change.
    #[serde(alias = "Command")]
    pub command: Option<String>,

    /// Pattern of paths to ignore.
    #[serde(alias = "Exclude")]
    pub exclude: String,

    /// Pattern of paths to watch.
    #[serde(alias = "Include")]
    pub include: String,

    /// Maximum number of connected clients.
    #[serde(alias = "ServerMaxConnection")]
    pub server_max_connection: usize,

    /// Wire format selector (`go-json` or `gem-listen`).
    #[serde(alias = "ServerFormat")]
    pub server_format: String,

    /// Long-lived companion command, restarted whenever it exits.
    #[serde(alias = "ParallelCommand")]
    pub parallel_command: Option<String>,
}

impl WatchConfig {
    /// Create a new config for the given root.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_server(mut self, addr: impl Into<String>) -> Self {
        self.server = Some(addr.into());
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_parallel_command(mut self, command: impl Into<String>) -> Self {
        self.parallel_command = Some(command.into());
        self
    }

    pub fn with_include(mut self, pattern: impl Into<String>) -> Self {
        self.include = pattern.into();
        self
    }

    pub fn with_exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude = pattern.into();
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.server_format = format.into();
        self
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.server_max_connection = max;
        self
    }

    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    /// Listen address, treating an empty string as disabled.
    pub fn server_addr(&self) -> Option<&str> {
        non_empty(self.server.as_deref())
    }

    pub fn reactive_command(&self) -> Option<&str> {
        non_empty(self.command.as_deref())
    }

    pub fn companion_command(&self) -> Option<&str> {
        non_empty(self.parallel_command.as_deref())
    }

    /// Compile the include/exclude pair.
    pub fn filter(&self) -> Result<EventFilter> {
        EventFilter::new(&self.include, &self.exclude)
    }

    /// Check that something will observe the events.
    pub fn validate(&self) -> Result<()> {
        if self.server_addr().is_none() && self.reactive_command().is_none() {
            return Err(WatchError::Config(
                "either a server address or a command must be set".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            verbose: false,
            server: None,
            command: None,
            exclude: DEFAULT_EXCLUDE.to_string(),
            include: DEFAULT_INCLUDE.to_string(),
            server_max_connection: DEFAULT_MAX_CONNECTIONS,
            server_format: GO_JSON.to_string(),
            parallel_command: None,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    #[test]
    fn test_defaults() {
        let config = WatchConfig::new("/watch");

        assert_eq!(config.path, Path::new("/watch"));
        assert_eq!(config.include, "*");
        assert_eq!(config.exclude, DEFAULT_EXCLUDE);
        assert_eq!(config.server_format, "go-json");
        assert_eq!(config.server_max_connection, 8);
        assert!(config.server_addr().is_none());
    }

    #[test]
    fn test_validate_requires_an_output() {
        assert!(WatchConfig::new("/watch").validate().is_err());
        assert!(WatchConfig::new("/watch").with_server("").validate().is_err());
        assert!(
            WatchConfig::new("/watch")
                .with_server("127.0.0.1:4000")
                .validate()
                .is_ok()
        );
        assert!(WatchConfig::new("/watch").with_command("make").validate().is_ok());
    }

    #[test]
    fn test_filter_uses_configured_patterns() {
        let filter = WatchConfig::new("/watch")
            .with_include(r"\.go")
            .filter()
            .unwrap();

        assert!(filter.accepts(Path::new("/watch/src/a.go")));
        assert!(!filter.accepts(Path::new("/watch/src/a.rs")));
        assert!(!filter.accepts(Path::new("/watch/node_modules/b.go")));
    }

    #[test]
    fn test_partial_deserialization_keeps_defaults() {
        let config: WatchConfig =
            serde_json::from_str(r#"{"path": "/srv", "command": "make"}"#).unwrap();

        assert_eq!(config.path, Path::new("/srv"));
        assert_eq!(config.reactive_command(), Some("make"));
        assert_eq!(config.server_max_connection, DEFAULT_MAX_CONNECTIONS);
    }
}
