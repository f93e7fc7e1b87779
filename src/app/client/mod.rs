//! HTTP client for fetching submitted source files
//!
//! The module is organized into specialized components:
//! - `config`: HTTP client configuration and building
//! - `http`: Core HTTP operations with rate limiting and retries
//! - `fetch`: The `Fetcher` contract and its reqwest implementation

pub mod config;
pub mod fetch;
pub mod http;

pub use config::ClientConfig;
pub use fetch::{FetchOutcome, Fetcher, HttpFetcher};
pub use http::{HttpHandler, RetryPolicy};
