//! Retrieval of raw subscription documents.

use crate::config::UpstreamConfig;
use async_trait::async_trait;
use reqwest::{StatusCode, header};
use std::io;
use tokio::time::{Duration, sleep};

// Base delay between HTTP retries, doubled on every attempt.
const BASE_DELAY_MS: u64 = 500;
const MAX_DELAY_MS: u64 = 8_000;

const RETRIABLE_STATUS_CODES: &[StatusCode] = &[
    StatusCode::TOO_MANY_REQUESTS,     // 429
    StatusCode::INTERNAL_SERVER_ERROR, // 500
    StatusCode::BAD_GATEWAY,           // 502
    StatusCode::SERVICE_UNAVAILABLE,   // 503
    StatusCode::GATEWAY_TIMEOUT,       // 504
];

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("upstream responded with status {0}")]
    Status(StatusCode),
    #[error("upstream returned an empty document")]
    EmptyDocument,
}

/// Fetches the raw document for an upstream.
///
/// `user_agent` is the agent string of the parser the document is fetched
/// for. Sources that do not speak HTTP ignore it.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(
        &self,
        upstream: &UpstreamConfig,
        user_agent: &str,
    ) -> Result<Vec<u8>, FetchError>;
}

/// The production source: `file://` upstreams are read from disk, anything
/// else is requested over HTTP(S) with retries on transient failures.
#[derive(Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().build()?;
        Ok(HttpSource { client })
    }

    async fn fetch_http(
        &self,
        upstream: &UpstreamConfig,
        user_agent: &str,
    ) -> Result<Vec<u8>, FetchError> {
        let mut retries = 0;

        loop {
            let result = self
                .client
                .get(&upstream.url)
                .header(header::USER_AGENT, user_agent)
                .timeout(upstream.timeout())
                .send()
                .await;

            let retriable = match &result {
                Ok(response) => RETRIABLE_STATUS_CODES.contains(&response.status()),
                Err(e) => e.is_timeout() || e.is_connect(),
            };

            if retriable && retries < upstream.max_retries() {
                let delay = retry_delay(retries);
                tracing::debug!(
                    url = %upstream.url,
                    attempt = retries + 1,
                    delay_ms = delay.as_millis() as u64,
                    "retrying upstream request"
                );
                sleep(delay).await;
                retries += 1;
                continue;
            }

            let response = result?;
            if !response.status().is_success() {
                return Err(FetchError::Status(response.status()));
            }
            return Ok(response.bytes().await?.to_vec());
        }
    }
}

fn retry_delay(retries: u32) -> Duration {
    let factor = 2_u64.saturating_pow(retries);
    Duration::from_millis(BASE_DELAY_MS.saturating_mul(factor).min(MAX_DELAY_MS))
}

#[async_trait]
impl DocumentSource for HttpSource {
    async fn fetch(
        &self,
        upstream: &UpstreamConfig,
        user_agent: &str,
    ) -> Result<Vec<u8>, FetchError> {
        let body = match upstream.local_path() {
            Some(path) => tokio::fs::read(path).await.map_err(|source| FetchError::Io {
                path: path.to_string(),
                source,
            })?,
            None => self.fetch_http(upstream, user_agent).await?,
        };

        if body.is_empty() {
            return Err(FetchError::EmptyDocument);
        }
        Ok(body)
    }
}
