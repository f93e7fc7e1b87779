//! Application constants for safezip
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain.

use std::time::Duration;

/// Environment variable names
pub mod env {
    /// Environment variable holding the VirusTotal API key
    pub const VIRUSTOTAL_API_KEY: &str = "VIRUSTOTAL_API_KEY";

    /// Standard tracing filter variable
    pub const RUST_LOG: &str = "RUST_LOG";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = concat!("safezip/", env!("CARGO_PKG_VERSION"));

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 8;

    /// Maximum number of redirects to follow
    pub const MAX_REDIRECTS: usize = 10;

    /// Largest payload the fetcher accepts (512 MiB)
    pub const DEFAULT_MAX_DOWNLOAD_BYTES: u64 = 512 * 1024 * 1024;
}

/// Rate limiting and retry configuration
pub mod limits {
    /// Default rate limit for source fetches (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 10;

    /// Maximum retry attempts for transient transport failures
    pub const MAX_RETRIES: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const RETRY_BASE_DELAY_MS: u64 = 500;
}

/// Worker loop pacing
pub mod workers {
    use super::Duration;

    /// Sleep when the download queue is empty
    pub const DOWNLOAD_POLL_INTERVAL: Duration = Duration::from_secs(5);

    /// Sleep when the scan queue is empty
    pub const SCAN_POLL_INTERVAL: Duration = Duration::from_secs(30);

    /// Sleep when the zip queue is empty
    pub const ZIP_POLL_INTERVAL: Duration = Duration::from_secs(25);

    /// Sleep after a scan message was requeued with an unknown verdict
    pub const SCAN_REQUEUE_DELAY: Duration = Duration::from_secs(30);

    /// Reputation lookups before a request fails closed
    pub const MAX_SCAN_ATTEMPTS: u32 = 20;

    /// Grace period for worker loops on shutdown
    pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

    /// Poll interval used while waiting for a request to finish
    pub const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(2);
}

/// Reputation service constants
pub mod scan {
    /// VirusTotal v2 file report endpoint
    pub const VIRUSTOTAL_REPORT_URL: &str = "https://www.virustotal.com/vtapi/v2/file/report";

    /// VirusTotal v2 file upload endpoint
    pub const VIRUSTOTAL_SCAN_URL: &str = "https://www.virustotal.com/vtapi/v2/file/scan";

    /// Public API quota (requests per minute)
    pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 4;

    /// `response_code` meaning the report is available
    pub const REPORT_AVAILABLE: i64 = 1;
}

/// User-facing status messages
pub mod messages {
    /// Stored with the pending record on submission
    pub const SUBMITTED: &str = "File successfully submitted for processing";

    /// Stored with a successful result
    pub const READY: &str = "File processed successfully";

    /// Stored when the reputation service flags the content
    pub const THREAT_DETECTED: &str = "Threat detected by security scan";
}

/// Content store layout
pub mod store {
    /// Extension of canonical artifacts
    pub const ARTIFACT_EXTENSION: &str = "zip";

    /// Suffix for in-progress writes
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Directory name under the user cache dir
    pub const DEFAULT_DIR_NAME: &str = "safezip";
}

// Re-export commonly used constants at the top level for convenience
pub use http::USER_AGENT;
pub use workers::MAX_SCAN_ATTEMPTS;
