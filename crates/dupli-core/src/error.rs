//! Error types for the dupli engine.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using dupli's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for dupli operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Image bytes could not be decoded; fatal for that asset only
    #[error("Decode error: {0}")]
    Decode(String),

    /// Byte fetch/store against the object store failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Clustering transaction failed to commit under contention
    #[error("Transaction conflict: {0}")]
    TransactionConflict(String),

    /// External rasterizer failure on a PDF
    #[error("Rasterization error: {0}")]
    Rasterization(String),

    /// Asset not found
    #[error("Asset not found: {0}")]
    AssetNotFound(Uuid),

    /// Cluster not found
    #[error("Cluster not found: {0}")]
    ClusterNotFound(Uuid),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Internal(e.to_string())
    }
}

impl Error {
    /// Whether the external queue may safely redeliver the job.
    ///
    /// Clustering writes are idempotent upserts, so anything transient
    /// (store I/O, contention) is retryable. Decode and rasterization
    /// failures are deterministic for the same bytes and are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Database(_)
                | Error::Storage(_)
                | Error::TransactionConflict(_)
                | Error::Io(_)
        )
    }
}
