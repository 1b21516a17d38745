//! Error types for the daemon binary.
//!
//! [`DaemonError`] wraps every failure mode between process start and a
//! clean shutdown.

/// Top-level error for the daemon binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ffd_server::ConfigError,
    },

    /// The record seed file could not be loaded.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: ffd_store::StoreError,
    },

    /// The listener failed to start or run.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: ffd_server::ServerError,
    },

    /// Installing or waiting on a signal handler failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The accept loop task panicked or was cancelled.
    #[error("accept loop failed: {message}")]
    AcceptLoop {
        /// Description of the task failure.
        message: String,
    },
}
