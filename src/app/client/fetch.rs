//! Source fetcher: download, hash and stage submitted files

use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::header::CONTENT_DISPOSITION;
use tracing::{debug, info};
use url::Url;

use crate::app::digest::ContentDigest;
use crate::app::store::ContentStore;
use crate::errors::{FetchError, FetchResult};

use super::config::ClientConfig;
use super::http::{HttpHandler, RetryPolicy};

/// Result of a successful fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// SHA-256 of the fetched bytes
    pub digest: ContentDigest,
    /// Name suggested by the server or the URL, if any
    pub inferred_file_name: Option<String>,
    /// Payload size in bytes
    pub size: u64,
}

/// Retrieves remote content into the content store
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url`, store the bytes under `staging_key` and hash them
    async fn fetch(&self, url: &Url, staging_key: &str) -> FetchResult<FetchOutcome>;
}

/// reqwest-backed fetcher with rate limiting, retries and a size cap
pub struct HttpFetcher {
    http: HttpHandler,
    store: Arc<dyn ContentStore>,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(config: &ClientConfig, store: Arc<dyn ContentStore>) -> FetchResult<Self> {
        config.validate()?;
        let client = config.build_http_client()?;
        let retry = RetryPolicy {
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay,
        };
        let http = HttpHandler::per_second(client, config.rate_limit_rps, retry)?;

        Ok(Self {
            http,
            store,
            max_bytes: config.max_download_bytes,
        })
    }

    async fn download(&self, url: &Url) -> FetchResult<(Bytes, Option<String>)> {
        let response = self.http.get(url).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::ServerError {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        let header_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(file_name_from_content_disposition);
        let final_url = response.url().clone();

        let mut buffer = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if buffer.len() as u64 + chunk.len() as u64 > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            buffer.extend_from_slice(&chunk);
        }

        let name = header_name.or_else(|| file_name_from_url(&final_url));
        Ok((buffer.freeze(), name))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, staging_key: &str) -> FetchResult<FetchOutcome> {
        debug!("Fetching {} into {}", url, staging_key);
        let (content, inferred_file_name) = self.download(url).await?;

        let digest = ContentDigest::compute(&content);
        let size = content.len() as u64;
        self.store.write(staging_key, content).await?;

        info!("Fetched {} ({} bytes, sha256 {})", url, size, digest);
        Ok(FetchOutcome {
            digest,
            inferred_file_name,
            size,
        })
    }
}

/// Extract `filename=` from a Content-Disposition header value
pub fn file_name_from_content_disposition(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|part| {
            let (key, raw) = part.split_once('=')?;
            if !key.trim().eq_ignore_ascii_case("filename") {
                return None;
            }
            let name = raw.trim().trim_matches('"').trim();
            (!name.is_empty()).then(|| name.to_string())
        })
}

/// Last non-empty path segment of the URL
pub fn file_name_from_url(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::store::MemoryContentStore;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(store: Arc<MemoryContentStore>, max_bytes: u64) -> HttpFetcher {
        let config = ClientConfig {
            max_download_bytes: max_bytes,
            max_retries: 1,
            retry_base_delay: Duration::from_millis(1),
            rate_limit_rps: 100,
            ..Default::default()
        };
        HttpFetcher::new(&config, store).unwrap()
    }

    #[test]
    fn test_content_disposition_parsing() {
        let cases = [
            ("attachment; filename=\"report.pdf\"", Some("report.pdf")),
            ("attachment; FileName=setup.exe", Some("setup.exe")),
            ("inline", None),
            ("attachment; filename=\"\"", None),
        ];
        for (header, expected) in cases {
            assert_eq!(
                file_name_from_content_disposition(header).as_deref(),
                expected,
                "header: {header}"
            );
        }
    }

    #[test]
    fn test_file_name_from_url() {
        let url = Url::parse("https://example.com/files/tool.msi").unwrap();
        assert_eq!(file_name_from_url(&url).as_deref(), Some("tool.msi"));

        let url = Url::parse("https://example.com/files/").unwrap();
        assert_eq!(file_name_from_url(&url).as_deref(), Some("files"));

        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(file_name_from_url(&url), None);
    }

    #[tokio::test]
    async fn test_fetch_stages_content_and_hashes_it() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/download"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-disposition", "attachment; filename=\"hello.txt\"")
                    .set_body_bytes(b"hello".to_vec()),
            )
            .mount(&server)
            .await;

        let store = Arc::new(MemoryContentStore::new());
        let url = Url::parse(&format!("{}/download", server.uri())).unwrap();
        let outcome = fetcher(store.clone(), 1024)
            .fetch(&url, "req-1")
            .await
            .unwrap();

        assert_eq!(outcome.digest, ContentDigest::compute(b"hello"));
        assert_eq!(outcome.inferred_file_name.as_deref(), Some("hello.txt"));
        assert_eq!(outcome.size, 5);
        assert_eq!(store.read("req-1").await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_fetch_falls_back_to_url_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pkg/tool.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryContentStore::new());
        let url = Url::parse(&format!("{}/pkg/tool.bin", server.uri())).unwrap();
        let outcome = fetcher(store, 1024).fetch(&url, "req-2").await.unwrap();
        assert_eq!(outcome.inferred_file_name.as_deref(), Some("tool.bin"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_oversized_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 64]))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryContentStore::new());
        let url = Url::parse(&format!("{}/big", server.uri())).unwrap();
        let result = fetcher(store.clone(), 16).fetch(&url, "req-3").await;

        assert!(matches!(result, Err(FetchError::TooLarge { limit: 16 })));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_fetch_reports_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryContentStore::new());
        let url = Url::parse(&format!("{}/gone", server.uri())).unwrap();
        let result = fetcher(store, 1024).fetch(&url, "req-4").await;

        match result {
            Err(FetchError::ServerError { status, .. }) => assert_eq!(status, 404),
            other => panic!("expected ServerError, got {:?}", other),
        }
    }
}
