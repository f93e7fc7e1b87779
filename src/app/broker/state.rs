//! Internal state of the message broker
//!
//! All queues, the finished table and the per-digest build markers live in a
//! single struct guarded by one lock, so every broker operation is a single
//! atomic state transition.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::stats::BrokerStats;
use crate::app::digest::ContentDigest;
use crate::app::models::{
    DownloadMessage, FinishedMessage, RequestHeader, RequestId, RequestStatus, ResultKind,
    ScanMessage, Stage, ZipMessage,
};

/// Outcome of joining a digest build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildSlot {
    /// Caller owns the build and must scan and zip the content
    Leader,
    /// Another request is already building this digest
    Follower { leader: RequestId },
}

/// A digest currently being scanned or zipped
#[derive(Debug)]
struct DigestBuild {
    leader: RequestId,
    followers: Vec<RequestHeader>,
    started_at: DateTime<Utc>,
}

#[derive(Debug)]
pub(super) struct BrokerState {
    download: VecDeque<DownloadMessage>,
    scan: VecDeque<ScanMessage>,
    zip: VecDeque<ZipMessage>,
    /// Pending and terminal results by request
    finished: HashMap<RequestId, FinishedMessage>,
    /// Stage of every request that currently has a message in flight
    stages: HashMap<RequestId, Stage>,
    builds: HashMap<ContentDigest, DigestBuild>,
    /// Follower -> leader of the build it waits on
    followers: HashMap<RequestId, RequestId>,
    stats: BrokerStats,
}

impl BrokerState {
    pub(super) fn new() -> Self {
        Self {
            download: VecDeque::new(),
            scan: VecDeque::new(),
            zip: VecDeque::new(),
            finished: HashMap::new(),
            stages: HashMap::new(),
            builds: HashMap::new(),
            followers: HashMap::new(),
            stats: BrokerStats::new(),
        }
    }

    pub(super) fn push_download(&mut self, message: DownloadMessage) {
        self.stages
            .insert(message.header.request_id, Stage::Downloading);
        self.download.push_back(message);
        self.stats.submitted += 1;
    }

    pub(super) fn push_scan(&mut self, message: ScanMessage) {
        self.stages.insert(
            message.header.request_id,
            Stage::Scanning {
                attempts: message.attempts,
            },
        );
        if message.attempts > 0 {
            self.stats.scan_requeues += 1;
        }
        self.scan.push_back(message);
    }

    pub(super) fn push_zip(&mut self, message: ZipMessage) {
        self.stages.insert(message.header.request_id, Stage::Zipping);
        self.zip.push_back(message);
    }

    pub(super) fn pop_download(&mut self) -> Option<DownloadMessage> {
        self.download.pop_front()
    }

    pub(super) fn pop_scan(&mut self) -> Option<ScanMessage> {
        self.scan.pop_front()
    }

    pub(super) fn pop_zip(&mut self) -> Option<ZipMessage> {
        self.zip.pop_front()
    }

    /// Store a result; refuses to replace a terminal one
    pub(super) fn record_finished(&mut self, message: FinishedMessage) -> bool {
        let request_id = message.request_id();

        if let Some(existing) = self.finished.get(&request_id) {
            if existing.result_kind.is_terminal() {
                warn!(
                    "Refusing to overwrite terminal result {:?} of request {} with {:?}",
                    existing.result_kind, request_id, message.result_kind
                );
                self.stats.rejected_overwrites += 1;
                return false;
            }
        }

        if message.result_kind.is_terminal() {
            self.stages.remove(&request_id);
            self.count_terminal(message.result_kind);
            self.resolve_followers(&message);
        }

        self.finished.insert(request_id, message);
        true
    }

    fn count_terminal(&mut self, kind: ResultKind) {
        match kind {
            ResultKind::ReadyForDownload => self.stats.finished_ready += 1,
            ResultKind::Error => self.stats.finished_error += 1,
            ResultKind::Pending => {}
        }
    }

    /// Hand the leader's outcome to every request waiting on the same digest
    fn resolve_followers(&mut self, message: &FinishedMessage) {
        let Some(digest) = message.header.content_digest else {
            return;
        };

        let is_leader = self
            .builds
            .get(&digest)
            .is_some_and(|build| build.leader == message.request_id());
        if !is_leader {
            return;
        }

        let Some(build) = self.builds.remove(&digest) else {
            return;
        };
        debug!(
            "Build of {} by {} finished after {}s with {} follower(s)",
            digest,
            build.leader,
            Utc::now()
                .signed_duration_since(build.started_at)
                .num_seconds(),
            build.followers.len()
        );

        for follower in build.followers {
            let follower_id = follower.request_id;
            self.followers.remove(&follower_id);

            let already_terminal = self
                .finished
                .get(&follower_id)
                .is_some_and(|f| f.result_kind.is_terminal());
            if already_terminal {
                continue;
            }

            self.count_terminal(message.result_kind);
            self.finished
                .insert(follower_id, message.for_request(follower));
        }
    }

    /// Register the caller as leader or follower of the digest build
    pub(super) fn join_build(&mut self, header: &RequestHeader, digest: ContentDigest) -> BuildSlot {
        let request_id = header.request_id;

        match self.builds.get_mut(&digest) {
            Some(build) if build.leader != request_id => {
                let leader = build.leader;
                build.followers.push(header.clone());
                self.followers.insert(request_id, leader);
                self.stages.remove(&request_id);
                self.stats.followers += 1;
                BuildSlot::Follower { leader }
            }
            Some(_) => BuildSlot::Leader,
            None => {
                self.builds.insert(
                    digest,
                    DigestBuild {
                        leader: request_id,
                        followers: Vec::new(),
                        started_at: Utc::now(),
                    },
                );
                BuildSlot::Leader
            }
        }
    }

    pub(super) fn note_dedup_hit(&mut self) {
        self.stats.dedup_hits += 1;
    }

    pub(super) fn get_finished(&self, request_id: &RequestId) -> Option<FinishedMessage> {
        self.finished.get(request_id).cloned()
    }

    pub(super) fn status(&self, request_id: &RequestId) -> RequestStatus {
        if let Some(finished) = self.finished.get(request_id) {
            if finished.result_kind.is_terminal() {
                return finished.status();
            }
        }

        let tracked = self.followers.get(request_id).unwrap_or(request_id);
        if let Some(stage) = self.stages.get(tracked) {
            return RequestStatus::Pending { stage: *stage };
        }

        match self.finished.get(request_id) {
            Some(pending) => pending.status(),
            None => RequestStatus::NotFound,
        }
    }

    pub(super) fn snapshot_stats(&self) -> BrokerStats {
        let mut stats = self.stats.clone();
        stats.download_depth = self.download.len();
        stats.scan_depth = self.scan.len();
        stats.zip_depth = self.zip.len();
        stats.in_flight_builds = self.builds.len();
        stats
    }
}
