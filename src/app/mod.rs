//! Core application logic for safezip
//!
//! This module contains the message broker, the three stage workers and the
//! collaborators they depend on: the content store, the HTTP fetcher, the
//! reputation checker and the archiver. [`Pipeline`] ties them together.
//!
//! # Examples
//!
//! ```rust,no_run
//! use safezip::app::{MessageBroker, RequestHeader, ScanMessage};
//!
//! # async fn example() {
//! let broker = MessageBroker::new();
//! let header = RequestHeader::new(Some("setup.exe".to_string()), None);
//! let key = header.request_id.staging_key();
//! broker.send_scan(ScanMessage::new(header, key)).await;
//!
//! while let Some(message) = broker.receive_scan().await {
//!     println!("Scanning {}", message.header.request_id);
//! }
//! # }
//! ```

pub mod archiver;
pub mod broker;
pub mod client;
pub mod digest;
pub mod models;
pub mod pipeline;
pub mod reputation;
pub mod store;
pub mod worker;

// Re-export main public API
pub use archiver::{Archiver, ZipArchiver};
pub use broker::{BrokerStats, BuildSlot, MessageBroker, StageMessage};
pub use client::{ClientConfig, FetchOutcome, Fetcher, HttpFetcher, HttpHandler};
pub use digest::ContentDigest;
pub use models::{
    Artifact, DownloadMessage, FinishedMessage, RequestHeader, RequestId, RequestStatus,
    ResultKind, ScanMessage, Stage, ZipMessage,
};
pub use pipeline::{Pipeline, PipelineConfig, PipelineHandle};
pub use reputation::{ReputationChecker, ScanConfig, Verdict, VirusTotalChecker};
pub use store::{ContentStore, LocalContentStore, MemoryContentStore, StoreConfig};
pub use worker::{WorkerConfig, WorkerConfigBuilder, WorkerKind, WorkerStats};
