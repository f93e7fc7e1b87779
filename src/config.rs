//! Configuration management for safezip
//!
//! This module provides the TOML application configuration, multi-source
//! loading and conversion into the runtime configuration of each component.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::{ClientConfig, PipelineConfig, ScanConfig, StoreConfig, WorkerConfig};
use crate::constants::{env, http, limits, scan, workers};
use crate::errors::{ConfigError, ConfigResult};

/// File name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "safezip.toml";

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Content store settings
    pub store: StoreConfigToml,
    /// HTTP client settings
    pub client: ClientConfigToml,
    /// Reputation service settings
    pub scan: ScanConfigToml,
    /// Worker pacing settings
    pub workers: WorkerConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfigToml {
    /// Store directory (system cache directory if unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    /// TCP keep-alive timeout in seconds (None = disabled)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tcp_keepalive_secs: Option<u64>,
    /// TCP nodelay setting
    pub tcp_nodelay: bool,
    /// Connection pool idle timeout in seconds (None = no timeout)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_idle_timeout_secs: Option<u64>,
    /// Maximum connections per host
    pub pool_max_per_host: usize,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Redirects to follow
    pub max_redirects: usize,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
    /// Retries for throttled or failed requests
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub retry_base_delay_ms: u64,
    /// Largest accepted download in bytes
    pub max_download_bytes: u64,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        Self {
            tcp_keepalive_secs: Some(30),
            tcp_nodelay: true,
            pool_idle_timeout_secs: Some(http::POOL_IDLE_TIMEOUT.as_secs()),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            request_timeout_secs: http::DEFAULT_TIMEOUT.as_secs(),
            connect_timeout_secs: http::CONNECT_TIMEOUT.as_secs(),
            max_redirects: http::MAX_REDIRECTS,
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
            max_retries: limits::MAX_RETRIES,
            retry_base_delay_ms: limits::RETRY_BASE_DELAY_MS,
            max_download_bytes: http::DEFAULT_MAX_DOWNLOAD_BYTES,
        }
    }
}

/// TOML-friendly reputation service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfigToml {
    /// VirusTotal API key (falls back to `VIRUSTOTAL_API_KEY`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub report_url: String,
    pub scan_url: String,
    /// Request quota shared by lookups and uploads
    pub requests_per_minute: u32,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for ScanConfigToml {
    fn default() -> Self {
        Self {
            api_key: None,
            report_url: scan::VIRUSTOTAL_REPORT_URL.to_string(),
            scan_url: scan::VIRUSTOTAL_SCAN_URL.to_string(),
            requests_per_minute: scan::DEFAULT_REQUESTS_PER_MINUTE,
            request_timeout_secs: http::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

/// TOML-friendly worker configuration
///
/// Durations are written in humantime form, e.g. `"30s"` or `"1m 30s"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfigToml {
    #[serde(with = "humantime_serde")]
    pub download_poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub scan_poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub zip_poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub scan_requeue_delay: Duration,
    pub max_scan_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfigToml {
    fn default() -> Self {
        Self {
            download_poll_interval: workers::DOWNLOAD_POLL_INTERVAL,
            scan_poll_interval: workers::SCAN_POLL_INTERVAL,
            zip_poll_interval: workers::ZIP_POLL_INTERVAL,
            scan_requeue_delay: workers::SCAN_REQUEUE_DELAY,
            max_scan_attempts: workers::MAX_SCAN_ATTEMPTS,
            shutdown_timeout: workers::SHUTDOWN_TIMEOUT,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level when no CLI flag or `RUST_LOG` is given
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Parse the configured level
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for an unknown level name
    pub fn level(&self) -> ConfigResult<tracing::Level> {
        self.level
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                value: self.level.clone(),
                reason: "Expected one of error, warn, info, debug, trace".to_string(),
            })
    }
}

/// Runtime configuration of every component
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub store: StoreConfig,
    pub client: ClientConfig,
    pub scan: ScanConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Convert TOML-friendly configuration to runtime configuration
    ///
    /// The API key falls back to the `VIRUSTOTAL_API_KEY` environment
    /// variable. Worker settings are validated.
    pub fn to_runtime_config(&self) -> ConfigResult<RuntimeConfig> {
        self.to_runtime_config_with_key(std::env::var(env::VIRUSTOTAL_API_KEY).ok())
    }

    /// Like [`to_runtime_config`](Self::to_runtime_config) with an explicit fallback key
    pub fn to_runtime_config_with_key(&self, env_key: Option<String>) -> ConfigResult<RuntimeConfig> {
        let pipeline = PipelineConfig {
            workers: self.workers.to_runtime_config(),
        };
        pipeline.validate()?;

        Ok(RuntimeConfig {
            store: self.store.to_runtime_config(),
            client: self.client.to_runtime_config(),
            scan: self.scan.to_runtime_config(env_key),
            pipeline,
        })
    }

    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (explicit path, `./safezip.toml`, then the user config dir)
    ///
    /// CLI flags and environment variables are applied on top by the caller.
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        if let Some(path) = config_file_override {
            if !path.exists() {
                return Err(ConfigError::NotFound { path });
            }
            return Self::load_from_file(&path).await;
        }

        match Self::find_config_file() {
            Some(path) => Self::load_from_file(&path).await,
            None => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(path) = Self::default_config_path() {
            search_paths.push(path);
        }

        search_paths.into_iter().find(|path| {
            let found = path.exists();
            if found {
                debug!("Found config file: {}", path.display());
            }
            found
        })
    }

    /// Default config file path for the current user
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("safezip").join("config.toml"))
    }

    /// Load configuration from a TOML file
    pub async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let config: AppConfig = toml::from_str(&content)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Write the commented default configuration to `path`
    ///
    /// An existing file is only replaced when `force` is set.
    pub async fn write_default(path: &Path, force: bool) -> ConfigResult<()> {
        if path.exists() && !force {
            return Err(ConfigError::InvalidValue {
                field: "path".to_string(),
                value: path.display().to_string(),
                reason: "File already exists; use --force to overwrite".to_string(),
            });
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        tokio::fs::write(path, Self::generate_default_config_content())
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        info!("Wrote default configuration to {}", path.display());
        Ok(())
    }

    /// Render the effective configuration with the API key masked
    pub fn to_display_toml(&self) -> ConfigResult<String> {
        let mut shown = self.clone();
        if shown.scan.api_key.is_some() {
            shown.scan.api_key = Some("********".to_string());
        }
        Ok(toml::to_string_pretty(&shown)?)
    }

    /// Generate default configuration content with helpful comments
    pub fn generate_default_config_content() -> String {
        format!(
            r#"# safezip configuration
# Every setting is optional; omitted values use the defaults shown here.

[store]
# Store directory (leave unset to use the system cache directory)
# root = "/path/to/store"

[client]
# HTTP settings for fetching submitted URLs
tcp_keepalive_secs = 30
tcp_nodelay = true
pool_idle_timeout_secs = {pool_idle}
pool_max_per_host = {pool_max}
request_timeout_secs = {request_timeout}
connect_timeout_secs = {connect_timeout}
max_redirects = {max_redirects}
rate_limit_rps = {rps}
max_retries = {max_retries}
retry_base_delay_ms = {retry_base}
max_download_bytes = {max_bytes}

[scan]
# VirusTotal settings; the key may also come from {env_key}
# api_key = "your-api-key"
report_url = "{report_url}"
scan_url = "{scan_url}"
requests_per_minute = {rpm}
request_timeout_secs = {request_timeout}

[workers]
# Idle poll intervals per stage
download_poll_interval = "{download_poll}"
scan_poll_interval = "{scan_poll}"
zip_poll_interval = "{zip_poll}"
# Wait after a scan without verdict
scan_requeue_delay = "{requeue}"
# Lookups before an unresolved scan fails
max_scan_attempts = {attempts}
shutdown_timeout = "{shutdown}"

[logging]
# Used when neither -v/-q nor RUST_LOG is given
level = "{log_level}"  # error, warn, info, debug, trace
"#,
            log_level = LoggingConfig::default().level,
            pool_idle = http::POOL_IDLE_TIMEOUT.as_secs(),
            pool_max = http::POOL_MAX_PER_HOST,
            request_timeout = http::DEFAULT_TIMEOUT.as_secs(),
            connect_timeout = http::CONNECT_TIMEOUT.as_secs(),
            max_redirects = http::MAX_REDIRECTS,
            rps = limits::DEFAULT_RATE_LIMIT_RPS,
            max_retries = limits::MAX_RETRIES,
            retry_base = limits::RETRY_BASE_DELAY_MS,
            max_bytes = http::DEFAULT_MAX_DOWNLOAD_BYTES,
            env_key = env::VIRUSTOTAL_API_KEY,
            report_url = scan::VIRUSTOTAL_REPORT_URL,
            scan_url = scan::VIRUSTOTAL_SCAN_URL,
            rpm = scan::DEFAULT_REQUESTS_PER_MINUTE,
            download_poll = secs(workers::DOWNLOAD_POLL_INTERVAL),
            scan_poll = secs(workers::SCAN_POLL_INTERVAL),
            zip_poll = secs(workers::ZIP_POLL_INTERVAL),
            requeue = secs(workers::SCAN_REQUEUE_DELAY),
            attempts = workers::MAX_SCAN_ATTEMPTS,
            shutdown = secs(workers::SHUTDOWN_TIMEOUT),
        )
    }
}

fn secs(duration: Duration) -> String {
    format!("{}s", duration.as_secs())
}

impl StoreConfigToml {
    /// Convert to runtime StoreConfig
    pub fn to_runtime_config(&self) -> StoreConfig {
        StoreConfig {
            root: self.root.clone(),
        }
    }
}

impl ClientConfigToml {
    /// Convert to runtime ClientConfig
    pub fn to_runtime_config(&self) -> ClientConfig {
        ClientConfig {
            tcp_keepalive: self.tcp_keepalive_secs.map(Duration::from_secs),
            tcp_nodelay: self.tcp_nodelay,
            pool_idle_timeout: self.pool_idle_timeout_secs.map(Duration::from_secs),
            pool_max_per_host: self.pool_max_per_host,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            max_redirects: self.max_redirects,
            rate_limit_rps: self.rate_limit_rps,
            max_retries: self.max_retries,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_download_bytes: self.max_download_bytes,
        }
    }
}

impl ScanConfigToml {
    /// Convert to runtime ScanConfig, using `env_key` when no key is configured
    pub fn to_runtime_config(&self, env_key: Option<String>) -> ScanConfig {
        let configured = self
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty());
        let api_key = configured.or_else(|| env_key.filter(|key| !key.trim().is_empty()));

        ScanConfig {
            api_key,
            report_url: self.report_url.clone(),
            scan_url: self.scan_url.clone(),
            requests_per_minute: self.requests_per_minute,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

impl WorkerConfigToml {
    /// Convert to runtime WorkerConfig
    pub fn to_runtime_config(&self) -> WorkerConfig {
        WorkerConfig {
            download_poll_interval: self.download_poll_interval,
            scan_poll_interval: self.scan_poll_interval,
            zip_poll_interval: self.zip_poll_interval,
            scan_requeue_delay: self.scan_requeue_delay,
            max_scan_attempts: self.max_scan_attempts,
            shutdown_timeout: self.shutdown_timeout,
        }
    }
}
