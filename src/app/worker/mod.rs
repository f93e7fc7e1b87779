//! Stage workers that move requests through the pipeline
//!
//! Each stage has one worker handling one message at a time:
//!
//! - `DownloadWorker`: fetch, hash, dedup against existing artifacts
//! - `ScanWorker`: reputation lookup with requeue and an attempt cap
//! - `ZipWorker`: archive vetted content under its digest
//!
//! Workers expose `process_next()`, a single non-blocking step. The shared
//! [`run_worker`] loop calls it, asks the [`Pacer`] how long to wait after
//! the outcome, and stops when the shutdown broadcast fires. A failing
//! message never stops a loop: it becomes a terminal error result.

use async_trait::async_trait;
use tracing::{debug, info};

pub mod config;
pub mod download;
pub mod pacing;
pub mod scan;
pub mod types;
pub mod zip;

pub use config::{WorkerConfig, WorkerConfigBuilder};
pub use download::DownloadWorker;
pub use pacing::{Pacer, ShutdownListener};
pub use scan::ScanWorker;
pub use types::{IterationOutcome, WorkerKind, WorkerStats};
pub use self::zip::ZipWorker;

/// One pipeline stage driven by [`run_worker`]
#[async_trait]
pub trait StageWorker: Send {
    fn kind(&self) -> WorkerKind;

    /// Handle at most one message; never blocks on an empty queue
    async fn process_next(&mut self) -> IterationOutcome;

    fn stats(&self) -> &WorkerStats;

    fn stats_mut(&mut self) -> &mut WorkerStats;
}

/// Drive `worker` until shutdown and return its final statistics
///
/// Shutdown is checked before every iteration and while pacing; a message
/// already being processed is finished first.
pub async fn run_worker<W: StageWorker>(
    mut worker: W,
    pacer: Pacer,
    mut shutdown: ShutdownListener,
) -> WorkerStats {
    let kind = worker.kind();
    info!("{} worker starting", kind);

    loop {
        if shutdown.is_triggered() {
            info!("{} worker received shutdown signal", kind);
            break;
        }

        let outcome = worker.process_next().await;
        worker.stats_mut().record(outcome);

        match pacer.delay_for(outcome) {
            Some(delay) => {
                debug!("{} worker {:?}, sleeping for {:?}", kind, outcome, delay);
                if shutdown.sleep(delay).await {
                    info!("{} worker received shutdown signal", kind);
                    break;
                }
            }
            None => tokio::task::yield_now().await,
        }
    }

    let stats = worker.stats().clone();
    info!("{} worker stopped: {}", kind, stats.summary());
    stats
}
