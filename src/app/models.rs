//! Request and message types carried through the pipeline
//!
//! Every stage message shares a [`RequestHeader`]. Download messages carry the
//! source URL; scan and zip messages carry the staging key of the bytes they
//! operate on; finished messages carry the terminal (or pending) outcome.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::app::digest::ContentDigest;
use crate::constants::messages;

/// Opaque, process-unique request identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a fresh identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Staging key under which this request's fetched bytes are stored
    pub fn staging_key(&self) -> String {
        self.0.hyphenated().to_string()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Fields shared by every message of a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHeader {
    /// Immutable request identifier
    pub request_id: RequestId,
    /// Content digest, set once by the download stage
    pub content_digest: Option<ContentDigest>,
    /// Display name of the fetched file
    pub file_name: Option<String>,
    /// Optional attribution string
    pub owner: Option<String>,
    /// When the request was submitted
    pub submitted_at: DateTime<Utc>,
}

impl RequestHeader {
    /// Create the header of a freshly submitted request
    pub fn new(file_name: Option<String>, owner: Option<String>) -> Self {
        Self {
            request_id: RequestId::generate(),
            content_digest: None,
            file_name,
            owner,
            submitted_at: Utc::now(),
        }
    }

    /// Entry name used inside the archive
    pub fn entry_name(&self) -> String {
        match (&self.file_name, &self.content_digest) {
            (Some(name), _) if !name.trim().is_empty() => name.clone(),
            (_, Some(digest)) => digest.to_hex(),
            _ => self.request_id.to_string(),
        }
    }
}

/// Request waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadMessage {
    pub header: RequestHeader,
    pub source_url: Url,
}

impl DownloadMessage {
    /// Create a download message for a new submission
    pub fn new(source_url: Url, file_name: Option<String>, owner: Option<String>) -> Self {
        Self {
            header: RequestHeader::new(file_name, owner),
            source_url,
        }
    }
}

/// Request whose staged content awaits a reputation verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanMessage {
    pub header: RequestHeader,
    /// Staging key of the fetched bytes
    pub content_path: String,
    /// Reputation lookups performed so far
    pub attempts: u32,
    /// Whether the content was already uploaded for analysis
    pub submitted_for_analysis: bool,
}

impl ScanMessage {
    /// Create the first scan message after a download
    pub fn new(header: RequestHeader, content_path: String) -> Self {
        Self {
            header,
            content_path,
            attempts: 0,
            submitted_for_analysis: false,
        }
    }

    /// Digest of the staged content
    ///
    /// Scan messages are only built after the download stage computed the
    /// digest, so a missing digest is a construction bug upstream.
    pub fn digest(&self) -> Option<ContentDigest> {
        self.header.content_digest
    }
}

/// Request whose staged content is ready to be archived
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZipMessage {
    pub header: RequestHeader,
    /// Staging key of the fetched bytes
    pub content_path: String,
}

impl From<ScanMessage> for ZipMessage {
    fn from(scan: ScanMessage) -> Self {
        Self {
            header: scan.header,
            content_path: scan.content_path,
        }
    }
}

/// Outcome recorded in the finished table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultKind {
    /// Submitted but not finished yet
    Pending,
    /// Artifact available under `content_path`
    ReadyForDownload,
    /// Request failed; `user_message` says why
    Error,
}

impl ResultKind {
    /// Whether no further transition is allowed
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ResultKind::Pending)
    }
}

/// Entry of the finished table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedMessage {
    pub header: RequestHeader,
    /// Artifact key when ready
    pub content_path: Option<String>,
    pub result_kind: ResultKind,
    /// Human-readable status or error text
    pub user_message: String,
    pub finished_at: DateTime<Utc>,
}

impl FinishedMessage {
    /// Placeholder recorded at submission time
    pub fn pending(header: RequestHeader) -> Self {
        Self {
            header,
            content_path: None,
            result_kind: ResultKind::Pending,
            user_message: messages::SUBMITTED.to_string(),
            finished_at: Utc::now(),
        }
    }

    /// Successful result pointing at the artifact
    pub fn ready(header: RequestHeader, artifact_key: String) -> Self {
        Self {
            header,
            content_path: Some(artifact_key),
            result_kind: ResultKind::ReadyForDownload,
            user_message: messages::READY.to_string(),
            finished_at: Utc::now(),
        }
    }

    /// Failed result with the raw cause text
    pub fn error(header: RequestHeader, message: impl Into<String>) -> Self {
        Self {
            header,
            content_path: None,
            result_kind: ResultKind::Error,
            user_message: message.into(),
            finished_at: Utc::now(),
        }
    }

    /// Copy this outcome onto another request's header
    pub fn for_request(&self, header: RequestHeader) -> Self {
        Self {
            header,
            content_path: self.content_path.clone(),
            result_kind: self.result_kind,
            user_message: self.user_message.clone(),
            finished_at: self.finished_at,
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.header.request_id
    }

    /// Map to the status returned to callers
    pub fn status(&self) -> RequestStatus {
        match (self.result_kind, &self.content_path) {
            (ResultKind::ReadyForDownload, Some(key)) => RequestStatus::Ready {
                artifact_key: key.clone(),
            },
            (ResultKind::ReadyForDownload, None) => RequestStatus::Error {
                message: "Finished without an artifact".to_string(),
            },
            (ResultKind::Error, _) => RequestStatus::Error {
                message: self.user_message.clone(),
            },
            (ResultKind::Pending, _) => RequestStatus::Pending {
                stage: Stage::Downloading,
            },
        }
    }
}

/// Pipeline stage of a live request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Downloading,
    Scanning { attempts: u32 },
    Zipping,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Downloading => write!(f, "downloading"),
            Stage::Scanning { attempts: 0 } => write!(f, "scanning"),
            Stage::Scanning { attempts } => write!(f, "scanning (attempt {})", attempts + 1),
            Stage::Zipping => write!(f, "zipping"),
        }
    }
}

/// Result of a status query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Unknown request id
    NotFound,
    /// Still moving through the pipeline
    Pending { stage: Stage },
    /// Artifact ready for retrieval
    Ready { artifact_key: String },
    /// Request failed
    Error { message: String },
}

impl RequestStatus {
    /// Whether the request reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Ready { .. } | RequestStatus::Error { .. })
    }

    /// Short human-readable description
    pub fn description(&self) -> String {
        match self {
            RequestStatus::NotFound => "not found".to_string(),
            RequestStatus::Pending { stage } => format!("pending ({})", stage),
            RequestStatus::Ready { artifact_key } => format!("ready ({})", artifact_key),
            RequestStatus::Error { message } => format!("error: {}", message),
        }
    }
}

/// Finished archive handed back to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// File name to offer for download (the artifact key)
    pub file_name: String,
    pub bytes: bytes::Bytes,
}
