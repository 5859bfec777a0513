//! Command line flags and configuration file loading.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use fswatch_core::WatchConfig;
use fswatch_core::format::{GEM_LISTEN, GO_JSON};

/// Watch a directory tree and broadcast or react to its changes.
#[derive(Debug, Parser)]
#[command(name = "fswatch", version)]
pub struct Cli {
    /// The path to watch.
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Display verbose information.
    #[arg(long)]
    pub verbose: bool,

    /// Open a TCP server broadcasting local modifications, e.g. 127.0.0.1:4000.
    #[arg(long)]
    pub server: Option<String>,

    /// The command to run when a file changes.
    #[arg(long)]
    pub command: Option<String>,

    /// Pattern of paths to ignore.
    #[arg(long)]
    pub exclude: Option<String>,

    /// Pattern of paths to include (all by default).
    #[arg(long)]
    pub include: Option<String>,

    /// The maximum number of connected clients.
    #[arg(long)]
    pub server_max_connection: Option<usize>,

    #[arg(long, help = format!("Output format: {GO_JSON} (default) or {GEM_LISTEN} (compatible with gem listen)"))]
    pub server_format: Option<String>,

    /// Run a command as a child process, restarted whenever it exits.
    #[arg(long)]
    pub parallel_command: Option<String>,

    /// Configuration file to use.
    #[arg(short = 'c', value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Print the current configuration to stdout and exit.
    #[arg(short = 'p')]
    pub print_configuration: bool,
}

impl Cli {
    /// Merge flags over `base`. Flags that were given win.
    pub fn apply(&self, base: WatchConfig) -> WatchConfig {
        let mut config = base;

        if let Some(path) = &self.path {
            config.path = path.clone();
        }
        if let Some(server) = &self.server {
            config.server = Some(server.clone());
        }
        if let Some(command) = &self.command {
            config.command = Some(command.clone());
        }
        if let Some(exclude) = &self.exclude {
            config.exclude = exclude.clone();
        }
        if let Some(include) = &self.include {
            config.include = include.clone();
        }
        if let Some(max) = self.server_max_connection {
            config.server_max_connection = max;
        }
        if let Some(format) = &self.server_format {
            config.server_format = format.clone();
        }
        if let Some(command) = &self.parallel_command {
            config.parallel_command = Some(command.clone());
        }
        config.verbose |= self.verbose;

        config
    }

    /// Resolve the effective configuration from the file (if any) and flags.
    ///
    /// A configuration file that cannot be loaded is reported in the second
    /// element and otherwise ignored.
    pub fn resolve(&self) -> anyhow::Result<(WatchConfig, Option<anyhow::Error>)> {
        let (base, file_error) = match &self.config_file {
            Some(file) => match load_file(file) {
                Ok(config) => (config, None),
                Err(e) => (WatchConfig::default(), Some(e)),
            },
            None => (WatchConfig::default(), None),
        };

        let mut config = self.apply(base);
        config.path = std::path::absolute(&config.path)
            .with_context(|| format!("resolving {}", config.path.display()))?;

        Ok((config, file_error))
    }
}

/// Read a TOML configuration file.
pub fn load_file(path: &Path) -> anyhow::Result<WatchConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading configuration file {}", path.display()))?;

    toml::from_str(&raw).with_context(|| format!("parsing configuration file {}", path.display()))
}
