//! Prelude module for the safezip library
//!
//! This module re-exports the most commonly used items from the library,
//! providing a convenient way to import everything needed for typical usage
//! with a single `use safezip::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use safezip::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let runtime = AppConfig::load(None).await?.to_runtime_config()?;
//!     let store: Arc<dyn ContentStore> = Arc::new(LocalContentStore::new(&runtime.store).await?);
//!     let fetcher = Arc::new(HttpFetcher::new(&runtime.client, store.clone())?);
//!     let checker = Arc::new(VirusTotalChecker::new(&runtime.scan)?);
//!
//!     let pipeline = Pipeline::new(store, fetcher, checker, Arc::new(ZipArchiver::new()), runtime.pipeline);
//!     let handle = pipeline.start();
//!     // Submit URLs and poll their status...
//!     handle.shutdown().await?;
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Essential app components that are used in most integrations
pub use crate::app::{
    // Collaborators
    Archiver,
    // Data types
    Artifact,
    ClientConfig,
    ContentDigest,
    ContentStore,
    Fetcher,
    HttpFetcher,
    LocalContentStore,
    MemoryContentStore,
    // Core orchestration
    MessageBroker,
    Pipeline,
    PipelineConfig,
    PipelineHandle,
    ReputationChecker,
    RequestId,
    RequestStatus,
    ScanConfig,
    StoreConfig,
    Verdict,
    VirusTotalChecker,
    WorkerConfig,
    ZipArchiver,
};

pub use crate::config::{AppConfig, RuntimeConfig};

// Commonly used constants
pub use crate::constants::{MAX_SCAN_ATTEMPTS, USER_AGENT};

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

// Common external crate re-exports for convenience
pub use tokio;
