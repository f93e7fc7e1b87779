//! VirusTotal v2 reputation checker
//!
//! Lookups hit the file report endpoint with the digest as `resource`; a
//! report exists when `response_code` is 1, and the content is safe when no
//! engine flagged it. Uploads go to the file scan endpoint as multipart form.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::app::client::http::{HttpHandler, RetryPolicy};
use crate::app::digest::ContentDigest;
use crate::constants::{http, limits, scan};
use crate::errors::{ScanError, ScanResult};

use super::{ReputationChecker, ScanConfig, Verdict};

/// File report returned by the v2 API
///
/// Only the fields that drive the verdict are decoded; unknown fields are
/// ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileReport {
    pub response_code: i64,
    #[serde(default)]
    pub positives: Option<u32>,
    #[serde(default)]
    pub total: Option<u32>,
    #[serde(default)]
    pub verbose_msg: Option<String>,
}

impl FileReport {
    pub fn verdict(&self) -> Verdict {
        if self.response_code != scan::REPORT_AVAILABLE {
            return Verdict::Unknown;
        }
        match self.positives {
            Some(0) => Verdict::Safe,
            Some(_) => Verdict::Unsafe,
            None => Verdict::Unknown,
        }
    }
}

/// Reputation checker backed by the VirusTotal public API
pub struct VirusTotalChecker {
    http: HttpHandler,
    api_key: String,
    report_url: Url,
    scan_url: Url,
}

impl std::fmt::Debug for VirusTotalChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirusTotalChecker")
            .field("report_url", &self.report_url.as_str())
            .field("scan_url", &self.scan_url.as_str())
            .finish_non_exhaustive()
    }
}

impl VirusTotalChecker {
    /// # Errors
    ///
    /// Returns `ScanError::MissingApiKey` without a key and
    /// `ScanError::Configuration` for invalid endpoints or quota.
    pub fn new(config: &ScanConfig) -> ScanResult<Self> {
        config.validate()?;
        let api_key = config.require_api_key()?.to_string();
        let (report_url, scan_url) = config.endpoints()?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(http::CONNECT_TIMEOUT)
            .user_agent(http::USER_AGENT)
            .build()?;
        let retry = RetryPolicy {
            max_retries: limits::MAX_RETRIES,
            base_delay: Duration::from_millis(limits::RETRY_BASE_DELAY_MS),
        };
        let http = HttpHandler::per_minute(client, config.requests_per_minute, retry)?;

        Ok(Self {
            http,
            api_key,
            report_url,
            scan_url,
        })
    }

    async fn fetch_report(&self, digest: &ContentDigest) -> ScanResult<Option<FileReport>> {
        let mut url = self.report_url.clone();
        url.query_pairs_mut()
            .append_pair("resource", &digest.to_hex())
            .append_pair("apikey", &self.api_key);

        let response = self
            .http
            .send(&self.report_url, || self.http.client().get(url.as_str()))
            .await?;

        let status = response.status();
        // The public API answers 204 when the quota is exhausted
        if status == StatusCode::NO_CONTENT {
            debug!("Reputation quota exhausted while looking up {}", digest);
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScanError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        match serde_json::from_str::<FileReport>(&body) {
            Ok(report) => Ok(Some(report)),
            Err(e) => {
                warn!("Unparseable report for {}: {}", digest, e);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl ReputationChecker for VirusTotalChecker {
    async fn lookup(&self, digest: &ContentDigest) -> ScanResult<Verdict> {
        let verdict = match self.fetch_report(digest).await? {
            Some(report) => {
                debug!(
                    "Report for {}: response_code={} positives={:?}/{:?} {}",
                    digest,
                    report.response_code,
                    report.positives,
                    report.total,
                    report.verbose_msg.as_deref().unwrap_or("")
                );
                report.verdict()
            }
            None => Verdict::Unknown,
        };
        Ok(verdict)
    }

    async fn submit(&self, content: Bytes, file_name: &str) -> ScanResult<()> {
        let size = content.len();
        let response = self
            .http
            .send(&self.scan_url, || {
                let part = Part::stream(Body::from(content.clone())).file_name(file_name.to_string());
                let form = Form::new()
                    .text("apikey", self.api_key.clone())
                    .part("file", part);
                self.http.client().post(self.scan_url.as_str()).multipart(form)
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScanError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!("Uploaded {} ({} bytes) for analysis", file_name, size);
        Ok(())
    }
}
