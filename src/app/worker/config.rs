//! Worker configuration management
//!
//! Poll intervals, the scan requeue delay and the attempt cap for the three
//! stage workers, with validation and a builder.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::workers;
use crate::errors::{ConfigError, ConfigResult};

use super::types::WorkerKind;

/// Configuration shared by the stage workers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Sleep when the download queue is empty
    pub download_poll_interval: Duration,
    /// Sleep when the scan queue is empty
    pub scan_poll_interval: Duration,
    /// Sleep when the zip queue is empty
    pub zip_poll_interval: Duration,
    /// Sleep after requeueing a scan message with an unknown verdict
    pub scan_requeue_delay: Duration,
    /// Lookups after which an unknown verdict becomes a terminal error
    pub max_scan_attempts: u32,
    /// Grace period for the loops to stop on shutdown
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
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

impl WorkerConfig {
    /// Idle poll interval of a stage
    pub fn poll_interval(&self, kind: WorkerKind) -> Duration {
        match kind {
            WorkerKind::Download => self.download_poll_interval,
            WorkerKind::Scan => self.scan_poll_interval,
            WorkerKind::Zip => self.zip_poll_interval,
        }
    }

    /// Validate configuration values and return errors for invalid settings
    pub fn validate(&self) -> ConfigResult<()> {
        let intervals = [
            ("workers.download_poll_interval", self.download_poll_interval),
            ("workers.scan_poll_interval", self.scan_poll_interval),
            ("workers.zip_poll_interval", self.zip_poll_interval),
        ];
        for (field, interval) in intervals {
            if interval.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: "0s".to_string(),
                    reason: "Poll interval must be greater than zero".to_string(),
                });
            }
        }

        if self.max_scan_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "workers.max_scan_attempts".to_string(),
                value: "0".to_string(),
                reason: "At least one reputation lookup is required".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for WorkerConfig
#[derive(Debug, Default)]
pub struct WorkerConfigBuilder {
    config: WorkerConfig,
}

impl WorkerConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn download_poll_interval(mut self, interval: Duration) -> Self {
        self.config.download_poll_interval = interval;
        self
    }

    pub fn scan_poll_interval(mut self, interval: Duration) -> Self {
        self.config.scan_poll_interval = interval;
        self
    }

    pub fn zip_poll_interval(mut self, interval: Duration) -> Self {
        self.config.zip_poll_interval = interval;
        self
    }

    /// Set all three idle poll intervals at once
    pub fn poll_interval(self, interval: Duration) -> Self {
        self.download_poll_interval(interval)
            .scan_poll_interval(interval)
            .zip_poll_interval(interval)
    }

    pub fn scan_requeue_delay(mut self, delay: Duration) -> Self {
        self.config.scan_requeue_delay = delay;
        self
    }

    pub fn max_scan_attempts(mut self, attempts: u32) -> Self {
        self.config.max_scan_attempts = attempts;
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> ConfigResult<WorkerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Build without validation (for testing)
    pub fn build_unchecked(self) -> WorkerConfig {
        self.config
    }
}
