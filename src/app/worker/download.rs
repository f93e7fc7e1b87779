//! Download stage
//!
//! Fetches the source URL into the staging key, fills in the digest and, when
//! missing, the file name. Content that already has an artifact finishes at
//! once; content already being built by another request joins that build;
//! anything else moves on to the scan queue.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::app::broker::{BuildSlot, MessageBroker};
use crate::app::client::Fetcher;
use crate::app::models::{DownloadMessage, FinishedMessage, ScanMessage};
use crate::app::store::ContentStore;
use crate::errors::Result;

use super::types::{IterationOutcome, WorkerKind, WorkerStats};
use super::StageWorker;

pub struct DownloadWorker {
    broker: MessageBroker,
    store: Arc<dyn ContentStore>,
    fetcher: Arc<dyn Fetcher>,
    stats: WorkerStats,
}

impl DownloadWorker {
    pub fn new(
        broker: MessageBroker,
        store: Arc<dyn ContentStore>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            broker,
            store,
            fetcher,
            stats: WorkerStats::new(WorkerKind::Download),
        }
    }

    async fn handle(&self, message: DownloadMessage, staging_key: &str) -> Result<()> {
        let outcome = self.fetcher.fetch(&message.source_url, staging_key).await?;

        let mut header = message.header;
        header.content_digest = Some(outcome.digest);
        let has_name = header
            .file_name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty());
        if !has_name {
            header.file_name = outcome.inferred_file_name;
        }

        let artifact_key = outcome.digest.artifact_key();
        if self.store.exists(&artifact_key).await? {
            info!(
                "Message {} matches existing artifact {}",
                header.request_id, artifact_key
            );
            self.broker.record_dedup_hit().await;
            self.broker
                .record_finished(FinishedMessage::ready(header, artifact_key))
                .await;
            self.discard_staging(staging_key).await;
            return Ok(());
        }

        match self.broker.join_build(&header, outcome.digest).await {
            BuildSlot::Leader => {
                self.broker
                    .send_scan(ScanMessage::new(header, staging_key.to_string()))
                    .await;
            }
            BuildSlot::Follower { .. } => self.discard_staging(staging_key).await,
        }
        Ok(())
    }

    async fn discard_staging(&self, staging_key: &str) {
        if let Err(e) = self.store.delete(staging_key).await {
            warn!("Failed to delete staged content {}: {}", staging_key, e);
        }
    }
}

#[async_trait]
impl StageWorker for DownloadWorker {
    fn kind(&self) -> WorkerKind {
        WorkerKind::Download
    }

    async fn process_next(&mut self) -> IterationOutcome {
        let Some(message) = self.broker.receive_download().await else {
            return IterationOutcome::Idle;
        };

        let header = message.header.clone();
        let staging_key = header.request_id.staging_key();
        info!("Downloading {} for message {}", message.source_url, header.request_id);

        if let Err(e) = self.handle(message, &staging_key).await {
            error!("Download of message {} failed: {}", header.request_id, e);
            self.discard_staging(&staging_key).await;
            self.broker
                .record_finished(FinishedMessage::error(header, e.to_string()))
                .await;
            self.stats.record_failure();
        }

        IterationOutcome::Processed
    }

    fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    fn stats_mut(&mut self) -> &mut WorkerStats {
        &mut self.stats
    }
}
