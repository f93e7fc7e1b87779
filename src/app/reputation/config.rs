//! Reputation service configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{http, scan};
use crate::errors::{ScanError, ScanResult};

/// Settings for the VirusTotal checker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// API key; falls back to `VIRUSTOTAL_API_KEY` when loading the app config
    pub api_key: Option<String>,
    /// File report endpoint
    pub report_url: String,
    /// File upload endpoint
    pub scan_url: String,
    /// Request quota shared by lookups and uploads
    pub requests_per_minute: u32,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            report_url: scan::VIRUSTOTAL_REPORT_URL.to_string(),
            scan_url: scan::VIRUSTOTAL_SCAN_URL.to_string(),
            requests_per_minute: scan::DEFAULT_REQUESTS_PER_MINUTE,
            request_timeout: http::DEFAULT_TIMEOUT,
        }
    }
}

impl ScanConfig {
    /// Configuration pointing both endpoints at `base`
    pub fn with_base_url(base: &str, api_key: impl Into<String>) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            api_key: Some(api_key.into()),
            report_url: format!("{base}/vtapi/v2/file/report"),
            scan_url: format!("{base}/vtapi/v2/file/scan"),
            ..Default::default()
        }
    }

    /// Parsed report and upload endpoints
    pub fn endpoints(&self) -> ScanResult<(Url, Url)> {
        let parse = |raw: &str| {
            Url::parse(raw).map_err(|e| ScanError::Configuration(format!("{raw}: {e}")))
        };
        Ok((parse(&self.report_url)?, parse(&self.scan_url)?))
    }

    /// API key, rejecting missing or blank keys
    pub fn require_api_key(&self) -> ScanResult<&str> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(ScanError::MissingApiKey),
        }
    }

    pub fn validate(&self) -> ScanResult<()> {
        if self.requests_per_minute == 0 {
            return Err(ScanError::Configuration(
                "requests_per_minute must be greater than 0".to_string(),
            ));
        }
        self.require_api_key()?;
        self.endpoints()?;
        Ok(())
    }
}
