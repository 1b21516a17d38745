//! Daemon binary for the FFD giveaway finder.
//!
//! Wires the configuration, logging, record store, and server together,
//! then serves proximity queries until `SIGINT` or `SIGTERM`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `$FFD_CONFIG` (default `ffd-config.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Load giveaway records from the seed file
//! 4. Install the termination signal handlers
//! 5. Bind the listener and start the accept loop
//! 6. Wait for a termination signal
//! 7. Stop the server, draining in-flight connections

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use ffd_server::{FfdConfig, LogFormat, Server};
use ffd_store::MemoryStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::DaemonError;

/// Default configuration path, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "ffd-config.yaml";

/// Application entry point for the daemon.
///
/// # Errors
///
/// Returns an error if any startup step fails or the accept loop dies.
#[tokio::main]
async fn main() -> Result<(), DaemonError> {
    // 1. Load configuration.
    let (config, config_path) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config);
    info!(
        config = %config_path.display(),
        host = %config.server.host,
        port = config.server.port,
        records = %config.store.records_path.display(),
        "ffd-daemon starting"
    );

    // 3. Load records.
    let store = MemoryStore::from_yaml_file(&config.store.records_path)?;
    info!(records = store.len(), "Record store loaded");

    // 4. Install signal handlers before anything needs stopping.
    let shutdown = ShutdownSignal::install()?;

    // 5. Bind and serve.
    let server = Server::bind(&config, Arc::new(store))?;
    let accept_loop = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.run().await }
    });

    // 6. Wait for a termination signal. The server is stopped even if
    // waiting failed.
    let signalled = shutdown.recv().await;

    // 7. Drain.
    server.stop().await;
    accept_loop
        .await
        .map_err(|e| DaemonError::AcceptLoop {
            message: format!("{e}"),
        })??;
    signalled?;

    info!("ffd-daemon exited cleanly");
    Ok(())
}

/// Load configuration from `$FFD_CONFIG`, or the default path.
///
/// A missing file is not an error: defaults are used, still subject to
/// environment overrides and validation.
fn load_config() -> Result<(FfdConfig, PathBuf), DaemonError> {
    let path = std::env::var_os("FFD_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    let config = if path.exists() {
        FfdConfig::from_file(&path)?
    } else {
        let mut config = FfdConfig::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        config
    };
    Ok((config, path))
}

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
fn init_tracing(config: &FfdConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init(),
    }
}

/// Termination signals, registered up front so that a registration
/// failure surfaces before the listener is bound.
struct ShutdownSignal {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignal {
    fn install() -> Result<Self, DaemonError> {
        Ok(Self {
            #[cfg(unix)]
            terminate: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?,
        })
    }

    /// Resolve on `Ctrl-C`, or on `SIGTERM` where the platform has it.
    async fn recv(self) -> Result<(), DaemonError> {
        #[cfg(unix)]
        {
            let mut terminate = self.terminate;
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result?;
                    info!("SIGINT received");
                }
                _ = terminate.recv() => info!("SIGTERM received"),
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await?;
            info!("Ctrl-C received");
        }

        Ok(())
    }
}
