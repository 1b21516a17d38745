//! Error types for the record store.

/// Errors that can occur while loading or querying the record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to read a seed file from disk.
    #[error("failed to read records file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML seed content.
    #[error("failed to parse records YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A record failed validation while being loaded.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// A query did not finish within its deadline.
    #[error("query timed out")]
    Timeout,

    /// The backing store could not serve the query.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_yml::Error> for StoreError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}
