//! Lifecycle of the fetcher set.
//!
//! Every `setup`/`reload` creates a new generation: a fresh cancellation token
//! shared by one fetcher per valid upstream. Replacing a generation cancels
//! the old token and clears the store before any new fetcher is spawned, all
//! under one lock. Combined with the store's scoped writes, nothing produced
//! by an old generation can appear in a snapshot taken after `reload`
//! returns.

use crate::config::{ConfigError, UpstreamConfig, partition_valid};
use crate::fetcher::Fetcher;
use crate::metrics_defs::{REJECTED_UPSTREAMS, RELOADS};
use crate::source::DocumentSource;
use crate::store::AggregateStore;
use parking_lot::Mutex;
use shared::counter;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default, PartialEq)]
pub struct ReloadSummary {
    /// URLs of the fetchers that were started.
    pub started: Vec<String>,
    /// Entries that were skipped, with the reason.
    pub rejected: Vec<(String, ConfigError)>,
}

struct Generation {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

pub struct Coordinator {
    store: Arc<AggregateStore>,
    source: Arc<dyn DocumentSource>,
    active: Mutex<Option<Generation>>,
}

impl Coordinator {
    pub fn new(store: Arc<AggregateStore>, source: Arc<dyn DocumentSource>) -> Self {
        Coordinator {
            store,
            source,
            active: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<AggregateStore> {
        &self.store
    }

    /// Starts polling `configs`. Must be called from within a tokio runtime.
    pub fn setup(&self, configs: Vec<UpstreamConfig>) -> ReloadSummary {
        self.restart(configs, "setup")
    }

    /// Stops every running fetcher, empties the store and starts polling
    /// `configs`. Must be called from within a tokio runtime.
    pub fn reload(&self, configs: Vec<UpstreamConfig>) -> ReloadSummary {
        self.restart(configs, "reload")
    }

    fn restart(&self, configs: Vec<UpstreamConfig>, reason: &'static str) -> ReloadSummary {
        let mut active = self.active.lock();

        if let Some(previous) = active.take() {
            previous.token.cancel();
            tracing::debug!(
                fetchers = previous.handles.len(),
                "cancelled previous fetcher generation"
            );
        }
        self.store.clear();

        let (valid, rejected) = partition_valid(configs);
        for (url, e) in &rejected {
            tracing::warn!(url = %url, error = %e, "skipping upstream");
        }
        counter!(REJECTED_UPSTREAMS).increment(rejected.len() as u64);

        let token = CancellationToken::new();
        let mut started = Vec::with_capacity(valid.len());
        let mut handles = Vec::with_capacity(valid.len());
        for upstream in valid {
            started.push(upstream.url.clone());
            let fetcher = Fetcher::new(
                upstream,
                self.source.clone(),
                self.store.clone(),
                token.clone(),
            );
            handles.push(fetcher.spawn());
        }

        *active = Some(Generation { token, handles });
        counter!(RELOADS, "reason" => reason).increment(1);
        tracing::info!(
            reason,
            started = started.len(),
            rejected = rejected.len(),
            "upstream fetchers started"
        );

        ReloadSummary { started, rejected }
    }

    /// Cancels the running fetchers and waits for them to exit. The store
    /// keeps its last contents.
    pub async fn shutdown(&self) {
        let Some(generation) = self.active.lock().take() else {
            return;
        };
        generation.token.cancel();

        for handle in generation.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "fetcher task failed");
            }
        }
        tracing::info!("upstream fetchers stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ProxyOutbound;
    use crate::testutils::{CLASH_DOCUMENT, SINGBOX_DOCUMENT, StaticSource};
    use std::time::Duration;
    use tokio::time::sleep;

    const OLD: &str = "https://old.example.com/sub";
    const NEW: &str = "https://new.example.com/sub";

    async fn wait_for(store: &AggregateStore, len: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while store.snapshot().len() != len {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    fn names(list: &[ProxyOutbound]) -> Vec<&str> {
        list.iter().map(|p| p.name()).collect()
    }

    #[tokio::test]
    async fn test_setup_and_shutdown() {
        let source = Arc::new(StaticSource::new());
        source.serve(OLD, CLASH_DOCUMENT);
        let coordinator = Coordinator::new(Arc::new(AggregateStore::new()), source);

        let summary = coordinator.setup(vec![UpstreamConfig::new(OLD)]);
        assert_eq!(summary.started, vec![OLD]);
        assert!(summary.rejected.is_empty());

        wait_for(coordinator.store(), 3).await;
        coordinator.shutdown().await;
        assert_eq!(coordinator.store().snapshot().len(), 3);

        // A second shutdown is a no-op.
        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_reload_discards_in_flight_results() {
        let source = Arc::new(StaticSource::new());
        source.serve_slow(OLD, CLASH_DOCUMENT, Duration::from_millis(200));
        source.serve(NEW, SINGBOX_DOCUMENT);
        let coordinator = Coordinator::new(Arc::new(AggregateStore::new()), source);

        coordinator.setup(vec![UpstreamConfig::new(OLD)]);
        // Let the old fetcher start its slow request.
        sleep(Duration::from_millis(50)).await;

        coordinator.reload(vec![UpstreamConfig::new(NEW)]);
        assert!(coordinator.store().snapshot().upstream(OLD).is_none());

        wait_for(coordinator.store(), 2).await;
        // Outlive the old fetcher's remaining parser attempts.
        sleep(Duration::from_millis(600)).await;

        let snapshot = coordinator.store().snapshot();
        assert!(snapshot.upstream(OLD).is_none());
        assert_eq!(names(snapshot.combined()), vec!["JP-Relay", "US-Edge"]);
        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_tags_across_upstreams() {
        let source = Arc::new(StaticSource::new());
        source.serve(OLD, SINGBOX_DOCUMENT);
        source.serve(NEW, SINGBOX_DOCUMENT);
        let coordinator = Coordinator::new(Arc::new(AggregateStore::new()), source);

        coordinator.setup(vec![UpstreamConfig::new(OLD), UpstreamConfig::new(NEW)]);
        wait_for(coordinator.store(), 4).await;

        let relays = coordinator
            .store()
            .descriptors()
            .into_iter()
            .filter(|d| d.tag == "JP-Relay")
            .count();
        assert_eq!(relays, 2);
        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_rejected_upstreams() {
        let source = Arc::new(StaticSource::new());
        source.serve(NEW, CLASH_DOCUMENT);
        let coordinator = Coordinator::new(Arc::new(AggregateStore::new()), source);

        let summary = coordinator.reload(vec![
            UpstreamConfig::new("ftp://bad.example.com/sub"),
            UpstreamConfig::new(NEW),
            UpstreamConfig::new(NEW),
        ]);
        assert_eq!(summary.started, vec![NEW]);
        assert_eq!(summary.rejected.len(), 2);
        assert_eq!(
            summary.rejected[0].1,
            ConfigError::UnsupportedScheme("ftp".into())
        );
        assert_eq!(
            summary.rejected[1].1,
            ConfigError::DuplicateUpstream(NEW.into())
        );
        coordinator.shutdown().await;
    }
}
