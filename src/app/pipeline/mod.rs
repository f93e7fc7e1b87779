//! Pipeline facade
//!
//! Wires the broker, the stage workers and their collaborators together and
//! exposes the caller-facing operations: submission, status queries and
//! artifact retrieval. [`Pipeline::start`] spawns one task per stage and
//! returns a [`PipelineHandle`] used to stop them.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use safezip::app::{
//!     ClientConfig, HttpFetcher, LocalContentStore, Pipeline, PipelineConfig, ScanConfig,
//!     StoreConfig, VirusTotalChecker, ZipArchiver,
//! };
//! use safezip::app::store::ContentStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store: Arc<dyn ContentStore> = Arc::new(LocalContentStore::new(&StoreConfig::default()).await?);
//! let fetcher = Arc::new(HttpFetcher::new(&ClientConfig::default(), store.clone())?);
//! let checker = Arc::new(VirusTotalChecker::new(&ScanConfig::default())?);
//!
//! let pipeline = Pipeline::new(store, fetcher, checker, Arc::new(ZipArchiver::new()), PipelineConfig::default());
//! let handle = pipeline.start();
//!
//! let id = pipeline.submit("https://example.com/setup.exe".parse()?, None, None).await;
//! let status = pipeline
//!     .wait_for_terminal(&id, Duration::from_secs(2), Duration::from_secs(600))
//!     .await?;
//! println!("{}", status.description());
//!
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;

use crate::app::archiver::Archiver;
use crate::app::broker::{BrokerStats, MessageBroker};
use crate::app::client::Fetcher;
use crate::app::models::{Artifact, DownloadMessage, FinishedMessage, RequestId, RequestStatus};
use crate::app::reputation::ReputationChecker;
use crate::app::store::ContentStore;
use crate::app::worker::{
    run_worker, DownloadWorker, Pacer, ScanWorker, ShutdownListener, WorkerConfig, WorkerKind,
    ZipWorker,
};
use crate::errors::{ConfigResult, PipelineError, PipelineResult};

pub mod handle;
pub mod signals;

pub use handle::PipelineHandle;
pub use signals::{create_shutdown_channel, SignalHandler};

/// Runtime configuration of the pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub workers: WorkerConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.workers.validate()
    }
}

/// Entry point for submitting and tracking requests
#[derive(Clone)]
pub struct Pipeline {
    broker: MessageBroker,
    store: Arc<dyn ContentStore>,
    fetcher: Arc<dyn Fetcher>,
    checker: Arc<dyn ReputationChecker>,
    archiver: Arc<dyn Archiver>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn ContentStore>,
        fetcher: Arc<dyn Fetcher>,
        checker: Arc<dyn ReputationChecker>,
        archiver: Arc<dyn Archiver>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            broker: MessageBroker::new(),
            store,
            fetcher,
            checker,
            archiver,
            config,
        }
    }

    pub fn broker(&self) -> &MessageBroker {
        &self.broker
    }

    /// Accept a URL for processing
    ///
    /// The request is recorded as pending before it is queued, so its status
    /// is never `NotFound` once the id has been returned.
    pub async fn submit(
        &self,
        source_url: Url,
        file_name: Option<String>,
        owner: Option<String>,
    ) -> RequestId {
        let message = DownloadMessage::new(source_url, file_name, owner);
        let request_id = message.header.request_id;
        info!("Submitted {} as message {}", message.source_url, request_id);

        self.broker
            .record_finished(FinishedMessage::pending(message.header.clone()))
            .await;
        self.broker.send_download(message).await;
        request_id
    }

    pub async fn status(&self, request_id: &RequestId) -> RequestStatus {
        self.broker.status(request_id).await
    }

    /// Read back the artifact of a ready request
    ///
    /// Returns `None` unless the request is ready.
    pub async fn fetch_artifact(&self, request_id: &RequestId) -> PipelineResult<Option<Artifact>> {
        let RequestStatus::Ready { artifact_key } = self.status(request_id).await else {
            return Ok(None);
        };

        let bytes = self.store.read(&artifact_key).await?;
        Ok(Some(Artifact {
            file_name: artifact_key,
            bytes,
        }))
    }

    /// Poll until the request is terminal
    ///
    /// Unknown ids return `NotFound` at once.
    pub async fn wait_for_terminal(
        &self,
        request_id: &RequestId,
        poll_interval: Duration,
        timeout: Duration,
    ) -> PipelineResult<RequestStatus> {
        let deadline = Instant::now() + timeout;

        loop {
            let status = self.status(request_id).await;
            if status.is_terminal() || status == RequestStatus::NotFound {
                return Ok(status);
            }

            if Instant::now() >= deadline {
                return Err(PipelineError::WaitTimeout {
                    request_id: request_id.to_string(),
                    seconds: timeout.as_secs(),
                });
            }

            debug!("Message {} is {}", request_id, status.description());
            tokio::time::sleep(poll_interval).await;
        }
    }

    pub async fn stats(&self) -> BrokerStats {
        self.broker.stats().await
    }

    pub fn download_worker(&self) -> DownloadWorker {
        DownloadWorker::new(self.broker.clone(), self.store.clone(), self.fetcher.clone())
    }

    pub fn scan_worker(&self) -> ScanWorker {
        ScanWorker::new(
            self.broker.clone(),
            self.store.clone(),
            self.checker.clone(),
            self.config.workers.max_scan_attempts,
        )
    }

    pub fn zip_worker(&self) -> ZipWorker {
        ZipWorker::new(self.broker.clone(), self.store.clone(), self.archiver.clone())
    }

    /// Spawn the three worker loops
    ///
    /// Dropping the returned handle without calling `shutdown` also stops
    /// the loops, since a closed shutdown channel counts as a signal.
    pub fn start(&self) -> PipelineHandle {
        let (shutdown_tx, _) = create_shutdown_channel();
        let workers = &self.config.workers;
        let listener = || ShutdownListener::new(shutdown_tx.subscribe());

        let tasks = vec![
            (
                WorkerKind::Download,
                tokio::spawn(run_worker(
                    self.download_worker(),
                    Pacer::for_kind(WorkerKind::Download, workers),
                    listener(),
                )),
            ),
            (
                WorkerKind::Scan,
                tokio::spawn(run_worker(
                    self.scan_worker(),
                    Pacer::for_kind(WorkerKind::Scan, workers),
                    listener(),
                )),
            ),
            (
                WorkerKind::Zip,
                tokio::spawn(run_worker(
                    self.zip_worker(),
                    Pacer::for_kind(WorkerKind::Zip, workers),
                    listener(),
                )),
            ),
        ];

        info!("Pipeline started with {} workers", tasks.len());
        PipelineHandle::new(shutdown_tx, tasks, workers.shutdown_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::archiver::ZipArchiver;
    use crate::app::client::FetchOutcome;
    use crate::app::digest::ContentDigest;
    use crate::app::reputation::Verdict;
    use crate::app::store::MemoryContentStore;
    use crate::app::worker::{StageWorker, WorkerConfigBuilder};
    use crate::errors::{FetchResult, ScanResult};
    use async_trait::async_trait;
    use bytes::Bytes;

    /// Stages the URL path as the body
    struct EchoFetcher {
        store: Arc<MemoryContentStore>,
    }

    #[async_trait]
    impl Fetcher for EchoFetcher {
        async fn fetch(&self, url: &Url, staging_key: &str) -> FetchResult<FetchOutcome> {
            let body = Bytes::from(url.path().to_string());
            let digest = ContentDigest::compute(&body);
            let size = body.len() as u64;
            self.store.write(staging_key, body).await?;
            Ok(FetchOutcome {
                digest,
                inferred_file_name: None,
                size,
            })
        }
    }

    struct FixedChecker(Verdict);

    #[async_trait]
    impl ReputationChecker for FixedChecker {
        async fn lookup(&self, _digest: &ContentDigest) -> ScanResult<Verdict> {
            Ok(self.0)
        }

        async fn submit(&self, _content: Bytes, _file_name: &str) -> ScanResult<()> {
            Ok(())
        }
    }

    fn pipeline(verdict: Verdict) -> (Pipeline, Arc<MemoryContentStore>) {
        let store = Arc::new(MemoryContentStore::new());
        let config = PipelineConfig {
            workers: WorkerConfigBuilder::new()
                .poll_interval(Duration::from_secs(1))
                .scan_requeue_delay(Duration::from_secs(1))
                .max_scan_attempts(3)
                .build_unchecked(),
        };
        let pipeline = Pipeline::new(
            store.clone(),
            Arc::new(EchoFetcher {
                store: store.clone(),
            }),
            Arc::new(FixedChecker(verdict)),
            Arc::new(ZipArchiver::new()),
            config,
        );
        (pipeline, store)
    }

    fn url(path: &str) -> Url {
        Url::parse(&format!("http://files.test/{}", path)).unwrap()
    }

    #[tokio::test]
    async fn test_submit_is_immediately_pending() {
        let (pipeline, _) = pipeline(Verdict::Safe);
        let id = pipeline.submit(url("a"), None, None).await;

        assert!(matches!(
            pipeline.status(&id).await,
            RequestStatus::Pending { .. }
        ));
        assert_eq!(pipeline.stats().await.download_depth, 1);
        assert!(pipeline.fetch_artifact(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_request_is_not_found() {
        let (pipeline, _) = pipeline(Verdict::Safe);
        let id = RequestId::generate();

        assert_eq!(pipeline.status(&id).await, RequestStatus::NotFound);
        let waited = pipeline
            .wait_for_terminal(&id, Duration::from_secs(1), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(waited, RequestStatus::NotFound);
    }

    /// Stepping the workers by hand walks a request to an artifact
    #[tokio::test]
    async fn test_manual_stepping_produces_artifact() {
        let (pipeline, store) = pipeline(Verdict::Safe);
        let id = pipeline.submit(url("tool"), Some("tool.exe".into()), None).await;

        pipeline.download_worker().process_next().await;
        pipeline.scan_worker().process_next().await;
        pipeline.zip_worker().process_next().await;

        let artifact = pipeline.fetch_artifact(&id).await.unwrap().unwrap();
        let key = ContentDigest::compute(b"/tool").artifact_key();
        assert_eq!(artifact.file_name, key);
        assert_eq!(store.keys().await, vec![key]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_started_pipeline_reaches_ready_and_shuts_down() {
        let (pipeline, _) = pipeline(Verdict::Safe);
        let handle = pipeline.start();

        let id = pipeline.submit(url("payload"), None, None).await;
        let status = pipeline
            .wait_for_terminal(&id, Duration::from_millis(100), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(matches!(status, RequestStatus::Ready { .. }));

        let stats = handle.shutdown().await.unwrap();
        assert_eq!(stats.len(), 3);
        let total: u64 = stats.iter().map(|s| s.processed).sum();
        assert_eq!(total, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_verdict_exhausts_attempts() {
        let (pipeline, store) = pipeline(Verdict::Unknown);
        let handle = pipeline.start();

        let id = pipeline.submit(url("mystery"), None, None).await;
        let status = pipeline
            .wait_for_terminal(&id, Duration::from_millis(100), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            status,
            RequestStatus::Error {
                message: "Security scan did not complete after 3 attempts".to_string()
            }
        );
        assert!(store.is_empty().await);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_without_workers() {
        let (pipeline, _) = pipeline(Verdict::Safe);
        let id = pipeline.submit(url("stuck"), None, None).await;

        let err = pipeline
            .wait_for_terminal(&id, Duration::from_secs(1), Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::WaitTimeout { seconds: 10, .. }));
    }
}
