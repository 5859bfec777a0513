use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use fswatch_core::{
    BroadcastServer, Dispatcher, RecursiveWatcher, WatchConfig, WatchError, run_companion,
    start_server,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod args;

use args::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (config, file_error) = cli.resolve()?;

    if cli.print_configuration {
        print!("{}", toml::to_string(&config).context("encoding configuration")?);
        return Ok(());
    }

    init_tracing(config.verbose);

    if let Some(e) = file_error {
        warn!("Error while reading configuration file, {e:#}");
    }

    config.validate()?;
    debug!("Configuration: {config:#?}");

    run(config).await
}

/// Install the fmt subscriber; `RUST_LOG` overrides the verbosity flag.
fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// `--verbose` only raises our own crates; dependencies stay at info.
fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("info,fswatch_core={level},fswatch={level}")
}

async fn run(config: WatchConfig) -> anyhow::Result<()> {
    let filter = config.filter()?;
    let mut watcher = RecursiveWatcher::start(&config.path, filter)
        .with_context(|| format!("watching {}", config.path.display()))?;

    let server = Arc::new(BroadcastServer::from_config(&config));
    let dispatcher = Dispatcher::from_config(&config, Arc::clone(&server));
    let config = Arc::new(config);

    // Background tasks report fatal errors here; they never finish otherwise.
    let (fatal_tx, mut fatal_rx) = mpsc::channel::<WatchError>(2);

    {
        let config = Arc::clone(&config);
        let fatal_tx = fatal_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = start_server(server, &config).await {
                let _ = fatal_tx.send(e).await;
            }
        });
    }

    {
        let config = Arc::clone(&config);
        tokio::spawn(async move {
            if let Err(e) = run_companion(&config).await {
                let _ = fatal_tx.send(e).await;
            }
        });
    }

    tokio::select! {
        () = dispatcher.run(&mut watcher) => {
            info!("Watcher closed");
            Ok(())
        }
        Some(e) = fatal_rx.recv() => Err(e.into()),
        res = tokio::signal::ctrl_c() => {
            res.context("listening for ctrl-c")?;
            info!("Interrupted, shutting down");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_verbose_is_scoped_to_own_crates() {
        assert_eq!(
            default_directives(true),
            "info,fswatch_core=debug,fswatch=debug"
        );
        assert_eq!(
            default_directives(false),
            "info,fswatch_core=info,fswatch=info"
        );

        let filter = EnvFilter::new(default_directives(true));
        let rendered = filter.to_string();
        assert!(rendered.contains("fswatch_core=debug"), "{rendered}");
        assert!(!rendered.contains("notify"), "{rendered}");
    }
}
