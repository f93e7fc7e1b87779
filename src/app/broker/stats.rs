//! Broker statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of broker counters and queue depths
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerStats {
    /// Requests submitted to the download queue
    pub submitted: u64,
    /// Messages currently waiting in each queue
    pub download_depth: usize,
    pub scan_depth: usize,
    pub zip_depth: usize,
    /// Digests currently being scanned or zipped
    pub in_flight_builds: usize,
    /// Terminal results by kind (followers included)
    pub finished_ready: u64,
    pub finished_error: u64,
    /// Downloads answered from an existing artifact
    pub dedup_hits: u64,
    /// Downloads that joined another request's build
    pub followers: u64,
    /// Scan messages put back after an unknown verdict
    pub scan_requeues: u64,
    /// Attempts to overwrite a terminal result
    pub rejected_overwrites: u64,
    /// Broker creation time
    pub created_at: DateTime<Utc>,
}

impl BrokerStats {
    pub fn new() -> Self {
        Self {
            created_at: Utc::now(),
            ..Default::default()
        }
    }

    /// Requests that reached a terminal state
    pub fn finished_total(&self) -> u64 {
        self.finished_ready + self.finished_error
    }

    /// Requests still somewhere in the pipeline
    pub fn in_progress(&self) -> u64 {
        self.submitted.saturating_sub(self.finished_total())
    }

    /// Messages waiting across all queues
    pub fn queued(&self) -> usize {
        self.download_depth + self.scan_depth + self.zip_depth
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "submitted={} ready={} error={} dedup={} followers={} requeues={} queued={}",
            self.submitted,
            self.finished_ready,
            self.finished_error,
            self.dedup_hits,
            self.followers,
            self.scan_requeues,
            self.queued()
        )
    }
}
