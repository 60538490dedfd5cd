//! Crawl engine
//!
//! This module contains the traversal engine and its per-page passes:
//! - Fetching pages over HTTP
//! - Sanitizing fetched HTML
//! - Resolving and relocating embedded media
//! - Collapsing duplicate image occurrences
//! - Rewriting links to locally materialized content

mod collapse;
mod links;
mod media;
mod sanitize;
mod traversal;

pub use collapse::{collapse_duplicate_images, collapse_markdown_duplicates};
pub use links::ScopePrefix;
pub use sanitize::sanitize_document;
pub use traversal::{CrawlResult, CrawlRun, Traversal};

use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Result of fetching one page
#[derive(Debug)]
pub enum FetchOutcome {
    /// 2xx response with a text body
    Success { status: u16, body: String },

    /// Non-2xx response; the page is skipped
    HttpError { status: u16 },

    /// Connection/timeout/body error; the page is skipped
    NetworkError { error: String },

    /// The run's cancellation token fired during the request
    Cancelled,
}

/// Builds the HTTP client used for a run.
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches one page, racing the request against the run's cancellation token.
pub async fn fetch_page(client: &Client, url: &str, cancel: &CancellationToken) -> FetchOutcome {
    let request = client.get(url).send();

    let response = tokio::select! {
        r = request => r,
        _ = cancel.cancelled() => return FetchOutcome::Cancelled,
    };

    match response {
        Ok(response) => {
            let status = response.status();
            if !status.is_success() {
                return FetchOutcome::HttpError {
                    status: status.as_u16(),
                };
            }
            let body = tokio::select! {
                b = response.text() => b,
                _ = cancel.cancelled() => return FetchOutcome::Cancelled,
            };
            match body {
                Ok(body) => FetchOutcome::Success {
                    status: status.as_u16(),
                    body,
                },
                Err(e) => FetchOutcome::NetworkError {
                    error: e.to_string(),
                },
            }
        }
        Err(e) => {
            let error = if e.is_timeout() {
                "Request timeout".to_string()
            } else if e.is_connect() {
                "Connection refused".to_string()
            } else {
                e.to_string()
            };
            FetchOutcome::NetworkError { error }
        }
    }
}
