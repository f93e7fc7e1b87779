//! Zip stage
//!
//! Archives vetted content under `"{digest}.zip"`, removes the staged bytes
//! and records the request as ready for download.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::app::archiver::Archiver;
use crate::app::broker::MessageBroker;
use crate::app::models::{FinishedMessage, ZipMessage};
use crate::app::store::ContentStore;
use crate::errors::{AppError, Result};

use super::types::{IterationOutcome, WorkerKind, WorkerStats};
use super::StageWorker;

pub struct ZipWorker {
    broker: MessageBroker,
    store: Arc<dyn ContentStore>,
    archiver: Arc<dyn Archiver>,
    stats: WorkerStats,
}

impl ZipWorker {
    pub fn new(
        broker: MessageBroker,
        store: Arc<dyn ContentStore>,
        archiver: Arc<dyn Archiver>,
    ) -> Self {
        Self {
            broker,
            store,
            archiver,
            stats: WorkerStats::new(WorkerKind::Zip),
        }
    }

    /// Build and store the artifact, returning its key
    async fn build_artifact(&self, message: &ZipMessage) -> Result<String> {
        let digest = message
            .header
            .content_digest
            .ok_or_else(|| AppError::generic("Content digest missing"))?;

        let content = self.store.read(&message.content_path).await?;
        let archive = self
            .archiver
            .archive(content, &message.header.entry_name())
            .await?;

        let artifact_key = digest.artifact_key();
        self.store.write(&artifact_key, archive).await?;
        Ok(artifact_key)
    }

    async fn discard_staging(&self, staging_key: &str) {
        if let Err(e) = self.store.delete(staging_key).await {
            warn!("Failed to delete staged content {}: {}", staging_key, e);
        }
    }
}

#[async_trait]
impl StageWorker for ZipWorker {
    fn kind(&self) -> WorkerKind {
        WorkerKind::Zip
    }

    async fn process_next(&mut self) -> IterationOutcome {
        let Some(message) = self.broker.receive_zip().await else {
            return IterationOutcome::Idle;
        };
        let request_id = message.header.request_id;

        let result = self.build_artifact(&message).await;
        self.discard_staging(&message.content_path).await;

        match result {
            Ok(artifact_key) => {
                info!("Message {} archived as {}", request_id, artifact_key);
                self.broker
                    .record_finished(FinishedMessage::ready(message.header, artifact_key))
                    .await;
            }
            Err(e) => {
                error!("Archiving message {} failed: {}", request_id, e);
                self.broker
                    .record_finished(FinishedMessage::error(message.header, e.to_string()))
                    .await;
                self.stats.record_failure();
            }
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
