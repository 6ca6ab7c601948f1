//! Error types for swgate
//!
//! All modules use `SwgateResult<T>` as their return type.

use crate::lifecycle::WorkerState;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for swgate operations
pub type SwgateResult<T> = Result<T, SwgateError>;

/// All errors that can occur in swgate
#[derive(Error, Debug)]
pub enum SwgateError {
    // Cache errors
    #[error("Precache failed for {resource}: {reason}")]
    PrecacheFailed { resource: String, reason: String },

    #[error("Cache bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Invalid cache bucket name: {0}")]
    InvalidBucketName(String),

    #[error("Invalid precache manifest: {0}")]
    InvalidManifest(String),

    // Fetch errors
    #[error("Network request failed for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    // Worker lifecycle errors
    #[error("Invalid worker state transition: {from} -> {to}")]
    InvalidTransition { from: WorkerState, to: WorkerState },

    #[error("Worker unreachable: {0}")]
    WorkerUnreachable(String),

    #[error("No update is pending")]
    NoPendingUpdate,

    #[error("Cannot register {requested}: {active} is already active")]
    StaleVersion { requested: String, active: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Configuration file already exists: {0}")]
    ConfigExists(PathBuf),

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl SwgateError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a network error for a URL
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::PrecacheFailed { .. } | Self::WorkerUnreachable(_)
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::PrecacheFailed { .. } => {
                Some("Every manifest entry must be reachable; the active version keeps serving")
            }
            Self::ConfigNotFound(_) => Some("Run: swgate config init"),
            Self::ConfigExists(_) => Some("Use --force to overwrite"),
            Self::InvalidBucketName(_) => Some("Bucket names look like <app>-v<n>"),
            Self::NoPendingUpdate => Some("Register a newer version before applying an update"),
            Self::StaleVersion { .. } => Some("Bump cache.version on every deploy"),
            _ => None,
        }
    }
}
