//! Scan stage
//!
//! Looks up the digest of staged content. Safe content moves on to the zip
//! queue and unsafe content fails. Unknown content is uploaded for analysis
//! once and requeued until a verdict arrives or the attempt cap is reached.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::app::broker::MessageBroker;
use crate::app::models::{FinishedMessage, ScanMessage, ZipMessage};
use crate::app::reputation::{ReputationChecker, Verdict};
use crate::app::store::ContentStore;
use crate::constants::messages;

use super::types::{IterationOutcome, WorkerKind, WorkerStats};
use super::StageWorker;

pub struct ScanWorker {
    broker: MessageBroker,
    store: Arc<dyn ContentStore>,
    checker: Arc<dyn ReputationChecker>,
    max_attempts: u32,
    stats: WorkerStats,
}

impl ScanWorker {
    pub fn new(
        broker: MessageBroker,
        store: Arc<dyn ContentStore>,
        checker: Arc<dyn ReputationChecker>,
        max_attempts: u32,
    ) -> Self {
        Self {
            broker,
            store,
            checker,
            max_attempts,
            stats: WorkerStats::new(WorkerKind::Scan),
        }
    }

    /// Upload staged content; the flag is only set when the upload succeeded
    async fn submit_for_analysis(&self, message: &mut ScanMessage) {
        let request_id = message.header.request_id;
        let content = match self.store.read(&message.content_path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    "Could not read staged content of message {} for upload: {}",
                    request_id, e
                );
                return;
            }
        };

        match self
            .checker
            .submit(content, &message.header.entry_name())
            .await
        {
            Ok(()) => {
                info!("Message {} submitted for analysis", request_id);
                message.submitted_for_analysis = true;
            }
            Err(e) => warn!("Upload of message {} for analysis failed: {}", request_id, e),
        }
    }

    async fn fail(&mut self, message: ScanMessage, reason: String) {
        if let Err(e) = self.store.delete(&message.content_path).await {
            warn!("Failed to delete staged content {}: {}", message.content_path, e);
        }
        self.broker
            .record_finished(FinishedMessage::error(message.header, reason))
            .await;
        self.stats.record_failure();
    }
}

#[async_trait]
impl StageWorker for ScanWorker {
    fn kind(&self) -> WorkerKind {
        WorkerKind::Scan
    }

    async fn process_next(&mut self) -> IterationOutcome {
        let Some(mut message) = self.broker.receive_scan().await else {
            return IterationOutcome::Idle;
        };
        let request_id = message.header.request_id;

        let Some(digest) = message.digest() else {
            error!("Message {} reached the scan stage without a digest", request_id);
            self.fail(message, "Content digest missing".to_string()).await;
            return IterationOutcome::Processed;
        };

        message.attempts += 1;
        let verdict = match self.checker.lookup(&digest).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!("Reputation lookup for message {} failed: {}", request_id, e);
                Verdict::Unknown
            }
        };
        debug!(
            "Message {} verdict {} (attempt {}/{})",
            request_id, verdict, message.attempts, self.max_attempts
        );

        match verdict {
            Verdict::Safe => {
                info!("Message {} is safe", request_id);
                self.broker.send_zip(ZipMessage::from(message)).await;
                IterationOutcome::Processed
            }
            Verdict::Unsafe => {
                warn!("Message {} flagged as unsafe ({})", request_id, digest);
                self.fail(message, messages::THREAT_DETECTED.to_string())
                    .await;
                IterationOutcome::Processed
            }
            Verdict::Unknown if message.attempts >= self.max_attempts => {
                let reason = format!(
                    "Security scan did not complete after {} attempts",
                    message.attempts
                );
                error!("Message {}: {}", request_id, reason);
                self.fail(message, reason).await;
                IterationOutcome::Processed
            }
            Verdict::Unknown => {
                if !message.submitted_for_analysis {
                    self.submit_for_analysis(&mut message).await;
                }
                self.broker.requeue_scan(message).await;
                IterationOutcome::Requeued
            }
        }
    }

    fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    fn stats_mut(&mut self) -> &mut WorkerStats {
        &mut self.stats
    }
}
