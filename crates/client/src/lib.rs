//! Client code for repodex.
//!
//! This crate provides the GitHub fetcher (tree listing, raw content, retry
//! with backoff) and the ingestion pipeline shared by the server and CLI.

pub mod fetch;
pub mod github;
pub mod ingest;

pub use fetch::{HttpResponse, HttpTransport, RetryPolicy, Sleeper, ThreadSleeper, Transport, TransportError};
pub use github::{FetchError, GithubClient, GithubConfig};
pub use ingest::Pipeline;
pub use url::Url;
