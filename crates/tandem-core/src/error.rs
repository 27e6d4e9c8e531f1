//! Error types for tandem-core

use thiserror::Error;

/// Result type alias using tandem-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tandem-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Timer record not found
    #[error("Timer not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transient failure reading from or writing to the remote record store
    #[error("Remote store error: {0}")]
    Remote(String),

    /// Push channel failure (subscribe, delivery, or timeout)
    #[error("Channel error: {0}")]
    Channel(String),
}

impl Error {
    /// Whether the failure is expected to clear up on its own.
    ///
    /// Transient errors degrade the client to "stale but eventually
    /// consistent"; the next sweep or channel event reconciles.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Remote(_) | Self::Channel(_) | Self::LibSql(_))
    }
}
