//! Error types for safezip
//!
//! Each pipeline concern has its own error enum. Worker stages never let these
//! escape their loop: a failing message is converted into a terminal
//! `FinishedMessage` carrying the error's display text, which is exactly what
//! the user sees when polling the request status.

use std::path::PathBuf;

use thiserror::Error;

/// Content store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// No object stored under the key
    #[error("Object not found in content store: {key}")]
    NotFound { key: String },

    /// Key is empty or would escape the store root
    #[error("Invalid content store key: {key}")]
    InvalidKey { key: String },

    /// Store root could not be created or accessed
    #[error("Content store directory not accessible: {path}")]
    DirectoryNotAccessible { path: PathBuf },

    /// Atomic rename of a freshly written object failed
    #[error("Atomic write failed: could not rename {temp_path} to {final_path}")]
    AtomicOperationFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
    },

    /// Generic I/O error
    #[error("Content store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Remote fetch errors
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Server returned HTTP {status} for {url}")]
    ServerError { url: String, status: u16 },

    /// Rate limit exceeded even after backing off
    #[error("Rate limit exceeded. Server responded with HTTP 429")]
    RateLimitExceeded,

    /// Server overloaded even after backing off
    #[error("Server overloaded. Server responded with HTTP 503")]
    ServerOverloaded,

    /// Transport kept failing
    #[error("Maximum retry attempts ({max_retries}) exceeded for {url}")]
    MaxRetriesExceeded { url: String, max_retries: u32 },

    /// Payload larger than the configured limit
    #[error("Remote file exceeds size limit of {limit} bytes")]
    TooLarge { limit: u64 },

    /// Staged bytes could not be persisted
    #[error("Failed to stage downloaded content: {0}")]
    Store(#[from] StoreError),

    /// Invalid client configuration
    #[error("Invalid HTTP client configuration: {0}")]
    Configuration(String),
}

/// Reputation service errors
#[derive(Error, Debug)]
pub enum ScanError {
    /// HTTP transport error
    #[error("Reputation service request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport kept failing after retries
    #[error("Reputation service unreachable: {0}")]
    Transport(#[from] FetchError),

    /// Service did not accept the request
    #[error("Reputation service rejected request: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Response body did not match the expected report shape
    #[error("Unexpected reputation service response: {reason}")]
    UnexpectedResponse { reason: String },

    /// No API key configured
    #[error("Missing reputation service API key. Set VIRUSTOTAL_API_KEY or [scan] api_key")]
    MissingApiKey,

    /// Invalid scan configuration
    #[error("Invalid reputation service configuration: {0}")]
    Configuration(String),
}

/// Archive creation errors
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Zip writer failure
    #[error("Failed to build zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// I/O error while writing the entry
    #[error("Archive I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Blocking archive task was cancelled or panicked
    #[error("Archive task failed: {0}")]
    Task(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format: {0}")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration could not be rendered
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// Config file could not be read or written
    #[error("Configuration I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Pipeline facade errors
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Artifact bytes could not be read back
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Worker loops did not stop in time
    #[error("Pipeline shutdown timed out after {seconds} seconds")]
    ShutdownTimeout { seconds: u64 },

    /// A worker task panicked
    #[error("{stage} worker terminated unexpectedly")]
    WorkerPanic { stage: String },

    /// Request did not reach a terminal state in time
    #[error("Request {request_id} still pending after {seconds} seconds")]
    WaitTimeout { request_id: String, seconds: u64 },
}

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    /// Content store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Fetch error
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Reputation service error
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Archive error
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Pipeline error
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is transient and worth retrying by the caller
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Fetch(FetchError::Http(_))
                | AppError::Fetch(FetchError::RateLimitExceeded)
                | AppError::Fetch(FetchError::ServerOverloaded)
                | AppError::Scan(ScanError::Http(_))
                | AppError::Pipeline(PipelineError::WaitTimeout { .. })
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Store(_) => "store",
            AppError::Fetch(_) => "fetch",
            AppError::Scan(_) => "scan",
            AppError::Archive(_) => "archive",
            AppError::Config(_) => "config",
            AppError::Pipeline(_) => "pipeline",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Content store result type alias
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Fetch result type alias
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Reputation service result type alias
pub type ScanResult<T> = std::result::Result<T, ScanError>;

/// Archive result type alias
pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Pipeline result type alias
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_wraps_into_fetch_error() {
        let err: FetchError = StoreError::NotFound {
            key: "abc".to_string(),
        }
        .into();
        assert!(err.to_string().contains("abc"));
        assert!(matches!(err, FetchError::Store(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_error_categories() {
        let app_error = AppError::Scan(ScanError::MissingApiKey);
        assert_eq!(app_error.category(), "scan");
        assert!(!app_error.is_recoverable());

        let app_error = AppError::Fetch(FetchError::RateLimitExceeded);
        assert_eq!(app_error.category(), "fetch");
        assert!(app_error.is_recoverable());
    }

    #[test]
    fn test_server_error_message_is_user_facing() {
        let err = FetchError::ServerError {
            url: "http://x/a.bin".to_string(),
            status: 404,
        };
        assert_eq!(err.to_string(), "Server returned HTTP 404 for http://x/a.bin");
    }
}
