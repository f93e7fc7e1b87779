//! Worker type definitions
//!
//! Iteration outcomes drive loop pacing; statistics are collected per stage
//! and returned when a loop stops.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of one worker iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IterationOutcome {
    /// Queue was empty
    Idle,
    /// A message was handled and moved on or finished
    Processed,
    /// A message was put back on its own queue
    Requeued,
}

/// Pipeline stage served by a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerKind {
    Download,
    Scan,
    Zip,
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerKind::Download => write!(f, "download"),
            WorkerKind::Scan => write!(f, "scan"),
            WorkerKind::Zip => write!(f, "zip"),
        }
    }
}

/// Counters kept by a worker loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub kind: WorkerKind,
    /// Messages handled
    pub processed: u64,
    /// Messages put back on the queue
    pub requeued: u64,
    /// Messages finished with an error
    pub failed: u64,
    /// Polls that found the queue empty
    pub idle_polls: u64,
    /// Idle polls since the last message
    pub consecutive_idle: u32,
    pub started_at: DateTime<Utc>,
    pub last_activity: Option<DateTime<Utc>>,
}

impl WorkerStats {
    pub fn new(kind: WorkerKind) -> Self {
        Self {
            kind,
            processed: 0,
            requeued: 0,
            failed: 0,
            idle_polls: 0,
            consecutive_idle: 0,
            started_at: Utc::now(),
            last_activity: None,
        }
    }

    /// Count an iteration outcome
    pub fn record(&mut self, outcome: IterationOutcome) {
        match outcome {
            IterationOutcome::Idle => {
                self.idle_polls += 1;
                self.consecutive_idle = self.consecutive_idle.saturating_add(1);
                return;
            }
            IterationOutcome::Processed => self.processed += 1,
            IterationOutcome::Requeued => self.requeued += 1,
        }
        self.consecutive_idle = 0;
        self.last_activity = Some(Utc::now());
    }

    /// Count a message finished with an error
    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub fn summary(&self) -> String {
        format!(
            "{} worker: processed={} requeued={} failed={} idle_polls={}",
            self.kind, self.processed, self.requeued, self.failed, self.idle_polls
        )
    }
}
