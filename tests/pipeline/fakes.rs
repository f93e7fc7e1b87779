//! In-memory collaborators for driving the pipeline without a network

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use safezip::app::store::{ContentStore, MemoryContentStore};
use safezip::app::{
    Archiver, ContentDigest, FetchOutcome, Fetcher, ReputationChecker, Verdict, ZipArchiver,
};
use safezip::errors::{ArchiveResult, FetchError, FetchResult, ScanResult};

/// Serves registered bodies by URL and stages them in the shared store
pub struct MapFetcher {
    store: Arc<MemoryContentStore>,
    bodies: Mutex<HashMap<String, Bytes>>,
    pub fetches: AtomicUsize,
}

impl MapFetcher {
    pub fn new(store: Arc<MemoryContentStore>) -> Self {
        Self {
            store,
            bodies: Mutex::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn serve(&self, url: &str, body: &'static [u8]) -> Url {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), Bytes::from_static(body));
        Url::parse(url).unwrap()
    }
}

#[async_trait]
impl Fetcher for MapFetcher {
    async fn fetch(&self, url: &Url, staging_key: &str) -> FetchResult<FetchOutcome> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let body = self
            .bodies
            .lock()
            .unwrap()
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| FetchError::ServerError {
                url: url.to_string(),
                status: 404,
            })?;

        let digest = ContentDigest::compute(&body);
        let size = body.len() as u64;
        self.store.write(staging_key, body).await?;

        Ok(FetchOutcome {
            digest,
            inferred_file_name: url
                .path_segments()
                .and_then(|s| s.last())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            size,
        })
    }
}

/// Replays scripted verdicts per digest; unscripted digests are safe
#[derive(Default)]
pub struct ScriptedChecker {
    scripts: Mutex<HashMap<ContentDigest, VecDeque<Verdict>>>,
    fallback: Mutex<Option<Verdict>>,
    pub lookups: AtomicUsize,
    pub uploads: Mutex<Vec<String>>,
}

impl ScriptedChecker {
    pub fn script(&self, content: &[u8], verdicts: Vec<Verdict>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(ContentDigest::compute(content), verdicts.into());
    }

    /// Verdict returned once a script runs out
    pub fn always(verdict: Verdict) -> Self {
        let checker = Self::default();
        *checker.fallback.lock().unwrap() = Some(verdict);
        checker
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl ReputationChecker for ScriptedChecker {
    async fn lookup(&self, digest: &ContentDigest) -> ScanResult<Verdict> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(digest)
            .and_then(VecDeque::pop_front);
        let fallback = self.fallback.lock().unwrap().unwrap_or(Verdict::Safe);
        Ok(scripted.unwrap_or(fallback))
    }

    async fn submit(&self, _content: Bytes, file_name: &str) -> ScanResult<()> {
        self.uploads.lock().unwrap().push(file_name.to_string());
        Ok(())
    }
}

/// Real zip archiver that counts invocations
#[derive(Default)]
pub struct CountingArchiver {
    inner: ZipArchiver,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Archiver for CountingArchiver {
    async fn archive(&self, content: Bytes, entry_name: &str) -> ArchiveResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.archive(content, entry_name).await
    }
}
