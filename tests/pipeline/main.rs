//! Integration tests for the fetch, scan and zip pipeline
//!
//! Workers are stepped by hand where the order of events matters; the full
//! run at the end uses the spawned loops under a paused clock.

mod fakes;

use std::io::{Cursor, Read};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use safezip::app::store::MemoryContentStore;
use safezip::app::worker::{IterationOutcome, StageWorker, WorkerConfigBuilder};
use safezip::app::{
    ContentDigest, FinishedMessage, Pipeline, PipelineConfig, RequestStatus, Stage, Verdict,
};
use safezip::constants::messages;

use fakes::{CountingArchiver, MapFetcher, ScriptedChecker};

struct Harness {
    pipeline: Pipeline,
    store: Arc<MemoryContentStore>,
    fetcher: Arc<MapFetcher>,
    checker: Arc<ScriptedChecker>,
    archiver: Arc<CountingArchiver>,
}

impl Harness {
    fn new(checker: ScriptedChecker, max_scan_attempts: u32) -> Self {
        let store = Arc::new(MemoryContentStore::new());
        let fetcher = Arc::new(MapFetcher::new(store.clone()));
        let checker = Arc::new(checker);
        let archiver = Arc::new(CountingArchiver::default());
        let config = PipelineConfig {
            workers: WorkerConfigBuilder::new()
                .poll_interval(Duration::from_secs(1))
                .scan_requeue_delay(Duration::from_secs(2))
                .max_scan_attempts(max_scan_attempts)
                .build()
                .unwrap(),
        };

        let pipeline = Pipeline::new(
            store.clone(),
            fetcher.clone(),
            checker.clone(),
            archiver.clone(),
            config,
        );

        Self {
            pipeline,
            store,
            fetcher,
            checker,
            archiver,
        }
    }

    fn lookups(&self) -> usize {
        self.checker.lookups.load(Ordering::SeqCst)
    }

    fn archives(&self) -> usize {
        self.archiver.calls.load(Ordering::SeqCst)
    }

    fn fetches(&self) -> usize {
        self.fetcher.fetches.load(Ordering::SeqCst)
    }
}

fn unzip_single(archive: &[u8]) -> (String, Vec<u8>) {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive.to_vec())).unwrap();
    assert_eq!(zip.len(), 1);
    let mut entry = zip.by_index(0).unwrap();
    let name = entry.name().to_string();
    let mut content = Vec::new();
    entry.read_to_end(&mut content).unwrap();
    (name, content)
}

/// Fresh content that scans safe ends up as `"{digest}.zip"`
#[tokio::test]
async fn test_new_safe_content_becomes_artifact() {
    let h = Harness::new(ScriptedChecker::default(), 5);
    let url = h.fetcher.serve("http://x/a.bin", b"first payload");

    let id = h.pipeline.submit(url, None, None).await;
    let (mut download, mut scan, mut zip) = (
        h.pipeline.download_worker(),
        h.pipeline.scan_worker(),
        h.pipeline.zip_worker(),
    );

    assert_eq!(download.process_next().await, IterationOutcome::Processed);
    assert_eq!(
        h.pipeline.status(&id).await,
        RequestStatus::Pending {
            stage: Stage::Scanning { attempts: 0 }
        }
    );
    assert_eq!(scan.process_next().await, IterationOutcome::Processed);
    assert_eq!(
        h.pipeline.status(&id).await,
        RequestStatus::Pending {
            stage: Stage::Zipping
        }
    );
    assert_eq!(zip.process_next().await, IterationOutcome::Processed);

    let key = ContentDigest::compute(b"first payload").artifact_key();
    assert_eq!(
        h.pipeline.status(&id).await,
        RequestStatus::Ready {
            artifact_key: key.clone()
        }
    );

    // Only the artifact remains; the staged download is gone
    assert_eq!(h.store.keys().await, vec![key.clone()]);

    let artifact = h.pipeline.fetch_artifact(&id).await.unwrap().unwrap();
    assert_eq!(artifact.file_name, key);
    let (entry, content) = unzip_single(&artifact.bytes);
    assert_eq!(entry, "a.bin");
    assert_eq!(content, b"first payload");
}

/// A second URL with the same bytes reuses the artifact without scanning
#[tokio::test]
async fn test_existing_artifact_short_circuits() {
    let h = Harness::new(ScriptedChecker::default(), 5);
    let first = h.fetcher.serve("http://x/a.bin", b"shared bytes");
    let mirror = h.fetcher.serve("http://mirror/other-name.bin", b"shared bytes");

    let (mut download, mut scan, mut zip) = (
        h.pipeline.download_worker(),
        h.pipeline.scan_worker(),
        h.pipeline.zip_worker(),
    );

    let first_id = h.pipeline.submit(first, None, None).await;
    download.process_next().await;
    scan.process_next().await;
    zip.process_next().await;
    assert!(h.pipeline.status(&first_id).await.is_terminal());

    let second_id = h.pipeline.submit(mirror, None, None).await;
    download.process_next().await;

    let key = ContentDigest::compute(b"shared bytes").artifact_key();
    assert_eq!(
        h.pipeline.status(&second_id).await,
        RequestStatus::Ready { artifact_key: key }
    );
    assert_eq!(h.fetches(), 2);
    assert_eq!(h.lookups(), 1);
    assert_eq!(h.archives(), 1);
    assert_eq!(scan.process_next().await, IterationOutcome::Idle);
    assert_eq!(zip.process_next().await, IterationOutcome::Idle);

    let stats = h.pipeline.stats().await;
    assert_eq!(stats.dedup_hits, 1);
    assert_eq!(stats.finished_ready, 2);
}

#[tokio::test]
async fn test_unsafe_content_is_rejected() {
    let checker = ScriptedChecker::default();
    checker.script(b"malware", vec![Verdict::Unsafe]);
    let h = Harness::new(checker, 5);
    let url = h.fetcher.serve("http://x/evil.exe", b"malware");

    let id = h.pipeline.submit(url, None, None).await;
    h.pipeline.download_worker().process_next().await;
    h.pipeline.scan_worker().process_next().await;

    assert_eq!(
        h.pipeline.status(&id).await,
        RequestStatus::Error {
            message: messages::THREAT_DETECTED.to_string()
        }
    );
    assert!(h.pipeline.fetch_artifact(&id).await.unwrap().is_none());
    assert!(h.store.is_empty().await);
    assert_eq!(h.archives(), 0);
}

/// Two unknown verdicts requeue the request; only the first uploads it
#[tokio::test]
async fn test_unknown_verdicts_requeue_and_upload_once() {
    let checker = ScriptedChecker::default();
    checker.script(
        b"fresh build",
        vec![Verdict::Unknown, Verdict::Unknown, Verdict::Safe],
    );
    let h = Harness::new(checker, 5);
    let url = h.fetcher.serve("http://x/fresh.msi", b"fresh build");

    let id = h.pipeline.submit(url, None, None).await;
    let mut scan = h.pipeline.scan_worker();
    h.pipeline.download_worker().process_next().await;

    assert_eq!(scan.process_next().await, IterationOutcome::Requeued);
    assert_eq!(
        h.pipeline.status(&id).await,
        RequestStatus::Pending {
            stage: Stage::Scanning { attempts: 1 }
        }
    );

    assert_eq!(scan.process_next().await, IterationOutcome::Requeued);
    assert_eq!(
        h.pipeline.status(&id).await,
        RequestStatus::Pending {
            stage: Stage::Scanning { attempts: 2 }
        }
    );

    assert_eq!(scan.process_next().await, IterationOutcome::Processed);
    assert_eq!(
        h.pipeline.status(&id).await,
        RequestStatus::Pending {
            stage: Stage::Zipping
        }
    );

    h.pipeline.zip_worker().process_next().await;
    assert!(matches!(
        h.pipeline.status(&id).await,
        RequestStatus::Ready { .. }
    ));

    assert_eq!(h.checker.upload_count(), 1);
    assert_eq!(h.checker.uploads.lock().unwrap()[0], "fresh.msi");
    assert_eq!(h.pipeline.stats().await.scan_requeues, 2);
}

#[tokio::test]
async fn test_scan_attempt_cap_fails_closed() {
    let h = Harness::new(ScriptedChecker::always(Verdict::Unknown), 4);
    let url = h.fetcher.serve("http://x/slow.bin", b"never analysed");

    let id = h.pipeline.submit(url, None, None).await;
    h.pipeline.download_worker().process_next().await;

    let mut scan = h.pipeline.scan_worker();
    for _ in 0..3 {
        assert_eq!(scan.process_next().await, IterationOutcome::Requeued);
    }
    assert_eq!(scan.process_next().await, IterationOutcome::Processed);
    assert_eq!(scan.process_next().await, IterationOutcome::Idle);

    assert_eq!(
        h.pipeline.status(&id).await,
        RequestStatus::Error {
            message: "Security scan did not complete after 4 attempts".to_string()
        }
    );
    assert_eq!(h.lookups(), 4);
    assert_eq!(h.checker.upload_count(), 1);
    assert!(h.store.is_empty().await);
}

/// Identical submissions in flight together are scanned and zipped once
#[tokio::test]
async fn test_concurrent_identical_submissions_build_once() {
    let h = Harness::new(ScriptedChecker::default(), 5);
    let urls: Vec<_> = (0..3)
        .map(|i| {
            h.fetcher
                .serve(&format!("http://mirror{}/tool.zip", i), b"same tool")
        })
        .collect();

    let mut ids = Vec::new();
    for url in urls {
        ids.push(h.pipeline.submit(url, None, None).await);
    }

    let mut download = h.pipeline.download_worker();
    for _ in 0..3 {
        download.process_next().await;
    }

    // Followers report the leader's stage
    for id in &ids {
        assert_eq!(
            h.pipeline.status(id).await,
            RequestStatus::Pending {
                stage: Stage::Scanning { attempts: 0 }
            }
        );
    }

    h.pipeline.scan_worker().process_next().await;
    h.pipeline.zip_worker().process_next().await;

    let key = ContentDigest::compute(b"same tool").artifact_key();
    for id in &ids {
        assert_eq!(
            h.pipeline.status(id).await,
            RequestStatus::Ready {
                artifact_key: key.clone()
            }
        );
    }
    assert_eq!(h.fetches(), 3);
    assert_eq!(h.lookups(), 1);
    assert_eq!(h.archives(), 1);
    assert_eq!(h.store.keys().await, vec![key]);

    let stats = h.pipeline.stats().await;
    assert_eq!(stats.followers, 2);
    assert_eq!(stats.finished_ready, 3);
    assert_eq!(stats.in_flight_builds, 0);
}

/// A failed build hands its error to followers; later content starts afresh
#[tokio::test]
async fn test_leader_error_reaches_followers() {
    let checker = ScriptedChecker::default();
    checker.script(b"trojan", vec![Verdict::Unsafe, Verdict::Safe]);
    let h = Harness::new(checker, 5);
    let leader_url = h.fetcher.serve("http://a/setup.exe", b"trojan");
    let follower_url = h.fetcher.serve("http://b/setup.exe", b"trojan");

    let leader = h.pipeline.submit(leader_url, None, None).await;
    let follower = h.pipeline.submit(follower_url, None, None).await;

    let mut download = h.pipeline.download_worker();
    let mut scan = h.pipeline.scan_worker();
    download.process_next().await;
    download.process_next().await;
    scan.process_next().await;

    let rejected = RequestStatus::Error {
        message: messages::THREAT_DETECTED.to_string(),
    };
    assert_eq!(h.pipeline.status(&leader).await, rejected);
    assert_eq!(h.pipeline.status(&follower).await, rejected);
    assert!(h.store.is_empty().await);

    let stats = h.pipeline.stats().await;
    assert_eq!(stats.followers, 1);
    assert_eq!(stats.finished_error, 2);
    assert_eq!(stats.in_flight_builds, 0);

    // Same bytes after the failure lead a new build
    let retry_url = h.fetcher.serve("http://c/setup.exe", b"trojan");
    let retry = h.pipeline.submit(retry_url, None, None).await;
    download.process_next().await;
    assert_eq!(
        h.pipeline.status(&retry).await,
        RequestStatus::Pending {
            stage: Stage::Scanning { attempts: 0 }
        }
    );
    assert_eq!(h.pipeline.stats().await.in_flight_builds, 1);

    scan.process_next().await;
    h.pipeline.zip_worker().process_next().await;
    let key = ContentDigest::compute(b"trojan").artifact_key();
    assert_eq!(
        h.pipeline.status(&retry).await,
        RequestStatus::Ready { artifact_key: key }
    );
    assert_eq!(h.pipeline.status(&follower).await, rejected);
    assert_eq!(h.lookups(), 2);
}

/// Terminal results are final and repeated status queries agree
#[tokio::test]
async fn test_terminal_status_is_stable() {
    let h = Harness::new(ScriptedChecker::default(), 5);
    let url = h.fetcher.serve("http://x/a.bin", b"stable");

    let id = h.pipeline.submit(url, None, None).await;
    h.pipeline.download_worker().process_next().await;
    h.pipeline.scan_worker().process_next().await;
    h.pipeline.zip_worker().process_next().await;

    let first = h.pipeline.status(&id).await;
    assert!(first.is_terminal());

    let finished = h.pipeline.broker().get_finished(&id).await.unwrap();
    let overwrite = FinishedMessage::error(finished.header, "late failure");
    assert!(!h.pipeline.broker().record_finished(overwrite).await);

    for _ in 0..3 {
        assert_eq!(h.pipeline.status(&id).await, first);
    }
    assert_eq!(h.pipeline.stats().await.rejected_overwrites, 1);
}

#[tokio::test]
async fn test_fetch_failure_reports_error() {
    let h = Harness::new(ScriptedChecker::default(), 5);
    let url = url::Url::parse("http://x/missing").unwrap();

    let id = h.pipeline.submit(url, None, None).await;
    h.pipeline.download_worker().process_next().await;

    assert_eq!(
        h.pipeline.status(&id).await,
        RequestStatus::Error {
            message: "Server returned HTTP 404 for http://x/missing".to_string()
        }
    );
    assert_eq!(h.lookups(), 0);
}

/// The spawned loops carry a mixed batch to completion
#[tokio::test(start_paused = true)]
async fn test_running_pipeline_end_to_end() {
    let checker = ScriptedChecker::default();
    checker.script(b"virus", vec![Verdict::Unsafe]);
    checker.script(b"new app", vec![Verdict::Unknown, Verdict::Safe]);
    let h = Harness::new(checker, 5);

    let urls = [
        h.fetcher.serve("http://x/app.exe", b"new app"),
        h.fetcher.serve("http://y/app-copy.exe", b"new app"),
        h.fetcher.serve("http://x/virus.exe", b"virus"),
    ];

    let handle = h.pipeline.start();
    let mut ids = Vec::new();
    for url in urls {
        ids.push(h.pipeline.submit(url, None, None).await);
    }

    let mut statuses = Vec::new();
    for id in &ids {
        statuses.push(
            h.pipeline
                .wait_for_terminal(id, Duration::from_millis(250), Duration::from_secs(300))
                .await
                .unwrap(),
        );
    }

    let key = ContentDigest::compute(b"new app").artifact_key();
    assert_eq!(
        statuses[0],
        RequestStatus::Ready {
            artifact_key: key.clone()
        }
    );
    assert_eq!(statuses[1], statuses[0]);
    assert_eq!(
        statuses[2],
        RequestStatus::Error {
            message: messages::THREAT_DETECTED.to_string()
        }
    );

    let worker_stats = handle.shutdown().await.unwrap();
    assert_eq!(worker_stats.len(), 3);
    assert_eq!(h.archives(), 1);
    assert_eq!(h.checker.upload_count(), 1);
    assert_eq!(h.store.keys().await, vec![key]);
}
