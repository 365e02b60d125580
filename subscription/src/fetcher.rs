//! Polling of a single upstream.
//!
//! A `Fetcher` fetches immediately when started and then once per interval
//! until its cancellation token fires. Each cycle tries every parser in
//! priority order, fetching the document with that parser's User-Agent, and
//! publishes the first non-empty result to the store. A failed cycle leaves
//! the upstream's previous list in place.

use crate::config::UpstreamConfig;
use crate::metrics_defs::{FETCH_DISCARDED, FETCH_DURATION, FETCH_FAILURE, FETCH_SUCCESS};
use crate::parse::{PARSERS, ParseError, parse_filtered};
use crate::proxy::{ProxyOutbound, SubscriptionFormat};
use crate::source::{DocumentSource, FetchError};
use crate::store::AggregateStore;
use shared::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

#[derive(thiserror::Error, Debug)]
pub enum AttemptError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[derive(thiserror::Error, Debug)]
pub enum FetchCycleError {
    #[error("no parser produced outbounds for {url}: {}", summarize(.attempts))]
    NoUsableParser {
        url: String,
        attempts: Vec<(SubscriptionFormat, AttemptError)>,
    },
}

fn summarize(attempts: &[(SubscriptionFormat, AttemptError)]) -> String {
    attempts
        .iter()
        .map(|(format, e)| format!("{format}: {e}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Runs one fetch cycle for `upstream` without touching any store.
pub async fn fetch_once(
    upstream: &UpstreamConfig,
    source: &dyn DocumentSource,
) -> Result<(SubscriptionFormat, Vec<ProxyOutbound>), FetchCycleError> {
    let mut attempts = Vec::with_capacity(PARSERS.len());

    for parser in PARSERS {
        let result = match source.fetch(upstream, parser.user_agent()).await {
            Ok(raw) => parse_filtered(*parser, &raw, &upstream.node_keywords)
                .map_err(AttemptError::from),
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(outbounds) => return Ok((parser.format(), outbounds)),
            Err(e) => {
                tracing::debug!(url = %upstream.url, format = %parser.format(), error = %e, "parser attempt failed");
                attempts.push((parser.format(), e));
            }
        }
    }

    Err(FetchCycleError::NoUsableParser {
        url: upstream.url.clone(),
        attempts,
    })
}

pub struct Fetcher {
    upstream: UpstreamConfig,
    source: Arc<dyn DocumentSource>,
    store: Arc<AggregateStore>,
    token: CancellationToken,
}

impl Fetcher {
    pub fn new(
        upstream: UpstreamConfig,
        source: Arc<dyn DocumentSource>,
        store: Arc<AggregateStore>,
        token: CancellationToken,
    ) -> Self {
        Fetcher {
            upstream,
            source,
            store,
            token,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        let interval = self.upstream.interval();
        tracing::info!(url = %self.upstream.url, interval_secs = interval.as_secs(), "fetcher started");

        loop {
            // A generation replaced before its first poll never fetches.
            if self.token.is_cancelled() {
                break;
            }
            // An in-flight cycle is allowed to finish; its write is discarded
            // by the store if the token fired in the meantime.
            self.refresh().await;

            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = sleep(interval) => {}
            }
        }

        tracing::info!(url = %self.upstream.url, "fetcher stopped");
    }

    /// Runs one cycle and publishes its result. Returns whether the store was
    /// updated.
    pub async fn refresh(&self) -> bool {
        let url = self.upstream.url.clone();
        let start = Instant::now();
        let result = fetch_once(&self.upstream, self.source.as_ref()).await;
        histogram!(FETCH_DURATION, "upstream" => url.clone()).record(start.elapsed().as_secs_f64());

        match result {
            Ok((format, outbounds)) => {
                let count = outbounds.len();
                if !self
                    .store
                    .update_upstream_scoped(&url, outbounds, &self.token)
                {
                    counter!(FETCH_DISCARDED, "upstream" => url.clone()).increment(1);
                    tracing::debug!(url = %url, "discarding result of cancelled fetcher");
                    return false;
                }
                counter!(FETCH_SUCCESS, "upstream" => url.clone(), "format" => format.to_string())
                    .increment(1);
                tracing::info!(url = %url, format = %format, outbounds = count, "upstream refreshed");
                true
            }
            Err(e) => {
                counter!(FETCH_FAILURE, "upstream" => url.clone()).increment(1);
                tracing::warn!(url = %url, error = %e, "upstream refresh failed, keeping previous outbounds");
                false
            }
        }
    }
}
