//! Reputation checks for fetched content
//!
//! A checker answers whether a digest is known to be safe, known to be
//! malicious, or not known yet. Unknown content can be uploaded for analysis
//! so that a later lookup has an answer.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::app::digest::ContentDigest;
use crate::errors::ScanResult;

pub mod config;
pub mod virustotal;

pub use config::ScanConfig;
pub use virustotal::{FileReport, VirusTotalChecker};

/// Reputation of a content digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    Safe,
    Unsafe,
    /// No report yet; ask again later
    Unknown,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Safe => write!(f, "safe"),
            Verdict::Unsafe => write!(f, "unsafe"),
            Verdict::Unknown => write!(f, "unknown"),
        }
    }
}

#[async_trait]
pub trait ReputationChecker: Send + Sync {
    /// Look up the verdict for `digest`
    async fn lookup(&self, digest: &ContentDigest) -> ScanResult<Verdict>;

    /// Upload content for analysis; best effort
    async fn submit(&self, content: Bytes, file_name: &str) -> ScanResult<()>;
}
