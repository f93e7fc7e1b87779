//! Message broker implementation
//!
//! The broker owns the three stage queues and the finished table. Handles are
//! cheap to clone and share the same state.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::app::digest::ContentDigest;
use crate::app::models::{
    DownloadMessage, FinishedMessage, RequestHeader, RequestId, RequestStatus, ScanMessage,
    ZipMessage,
};

use super::state::{BrokerState, BuildSlot};
use super::stats::BrokerStats;

/// Message routed to one of the stage queues
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageMessage {
    Download(DownloadMessage),
    Scan(ScanMessage),
    Zip(ZipMessage),
}

impl StageMessage {
    pub fn request_id(&self) -> RequestId {
        match self {
            StageMessage::Download(m) => m.header.request_id,
            StageMessage::Scan(m) => m.header.request_id,
            StageMessage::Zip(m) => m.header.request_id,
        }
    }
}

/// In-memory typed multi-queue broker
///
/// Dequeue never blocks: an empty queue yields `None` and the caller decides
/// how long to wait before asking again.
#[derive(Debug, Clone)]
pub struct MessageBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MessageBroker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState::new())),
        }
    }

    /// Route a message to the queue matching its variant
    pub async fn send(&self, message: StageMessage) {
        debug!("Routing message {}", message.request_id());
        match message {
            StageMessage::Download(m) => self.send_download(m).await,
            StageMessage::Scan(m) => self.send_scan(m).await,
            StageMessage::Zip(m) => self.send_zip(m).await,
        }
    }

    pub async fn send_download(&self, message: DownloadMessage) {
        let request_id = message.header.request_id;
        self.state.lock().await.push_download(message);
        info!("Message {} queued for DOWNLOAD", request_id);
    }

    pub async fn send_scan(&self, message: ScanMessage) {
        let request_id = message.header.request_id;
        let attempts = message.attempts;
        self.state.lock().await.push_scan(message);
        if attempts == 0 {
            info!("Message {} queued for SCAN", request_id);
        } else {
            debug!(
                "Message {} requeued for SCAN after {} attempt(s)",
                request_id, attempts
            );
        }
    }

    /// Put a scan message back at the tail of the scan queue
    pub async fn requeue_scan(&self, message: ScanMessage) {
        self.send_scan(message).await;
    }

    pub async fn send_zip(&self, message: ZipMessage) {
        let request_id = message.header.request_id;
        self.state.lock().await.push_zip(message);
        info!("Message {} queued for ZIP", request_id);
    }

    pub async fn receive_download(&self) -> Option<DownloadMessage> {
        self.state.lock().await.pop_download()
    }

    pub async fn receive_scan(&self) -> Option<ScanMessage> {
        self.state.lock().await.pop_scan()
    }

    pub async fn receive_zip(&self) -> Option<ZipMessage> {
        self.state.lock().await.pop_zip()
    }

    /// Record a pending or terminal result
    ///
    /// Returns `false` when the request already holds a terminal result; the
    /// stored result is left untouched in that case.
    pub async fn record_finished(&self, message: FinishedMessage) -> bool {
        let request_id = message.request_id();
        let kind = message.result_kind;
        let stored = self.state.lock().await.record_finished(message);
        if stored && kind.is_terminal() {
            info!("Message {} finished as {:?}", request_id, kind);
        }
        stored
    }

    /// Count a download answered from an existing artifact
    pub async fn record_dedup_hit(&self) {
        self.state.lock().await.note_dedup_hit();
    }

    /// Become leader of the digest build or follow the current one
    ///
    /// Followers receive a copy of the leader's terminal result when it is
    /// recorded.
    pub async fn join_build(&self, header: &RequestHeader, digest: ContentDigest) -> BuildSlot {
        let slot = self.state.lock().await.join_build(header, digest);
        if let BuildSlot::Follower { leader } = slot {
            info!(
                "Message {} follows build of {} led by {}",
                header.request_id, digest, leader
            );
        }
        slot
    }

    pub async fn get_finished(&self, request_id: &RequestId) -> Option<FinishedMessage> {
        self.state.lock().await.get_finished(request_id)
    }

    pub async fn status(&self, request_id: &RequestId) -> RequestStatus {
        self.state.lock().await.status(request_id)
    }

    pub async fn stats(&self) -> BrokerStats {
        self.state.lock().await.snapshot_stats()
    }
}

impl Default for MessageBroker {
    fn default() -> Self {
        Self::new()
    }
}
