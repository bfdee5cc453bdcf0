//! Error types for the ingestion pipeline.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the ingestion pipeline.
#[derive(Error, Debug)]
pub enum Error {
    // Pipeline taxonomy
    #[error("Ambiguous classification: {0}")]
    ClassificationAmbiguous(String),

    #[error("No catalog match: {0}")]
    NoCatalogMatch(String),

    #[error("Metadata provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Filesystem conflict: {0}")]
    FilesystemConflict(String),

    #[error("Batch partially failed: {success} succeeded, {failed} failed")]
    PartialBatchFailure { success: usize, failed: usize },

    // Job errors
    #[error("A {0} scan is already running")]
    JobAlreadyRunning(String),

    // Action errors
    #[error("Action {id} cannot move from {from} to {to}")]
    InvalidTransition { id: Uuid, from: String, to: String },

    #[error("Another pending action already targets {0}")]
    TargetBusy(String),

    // Catalog errors
    #[error("Not found: {0}")]
    NotFound(String),

    // File system errors
    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Size mismatch after copying {path}: expected {expected} bytes, found {actual}")]
    SizeMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },

    #[error("Checksum mismatch after copying: {0}")]
    ChecksumMismatch(String),

    // Naming errors
    #[error("Invalid naming template: {0}")]
    Template(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("TMDB API key not configured. Set TMDB_API_KEY environment variable")]
    TmdbApiKeyMissing,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // TOML errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    // Watcher errors
    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }
}
