//! The aggregate of every upstream's latest outbounds.
//!
//! Writers (one fetcher per upstream) serialize on a single mutex that guards
//! the per-upstream map. Each write rebuilds the combined list and publishes
//! a fresh `AggregateSnapshot` through an `ArcSwap`, so readers never take a
//! lock and never observe a partially rebuilt list.

use crate::metrics_defs::SNAPSHOT_OUTBOUNDS;
use crate::outbound::Outbound;
use crate::proxy::{ProxyOutbound, SubscriptionFormat};
use arc_swap::ArcSwap;
use indexmap::IndexMap;
use parking_lot::Mutex;
use shared::gauge;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

type UpstreamMap = IndexMap<String, Arc<[ProxyOutbound]>>;

/// An immutable view of all upstreams at one point in time.
#[derive(Debug, Default)]
pub struct AggregateSnapshot {
    per_upstream: UpstreamMap,
    combined: Vec<ProxyOutbound>,
}

impl AggregateSnapshot {
    fn build(per_upstream: UpstreamMap) -> Self {
        let combined = per_upstream
            .values()
            .flat_map(|list| list.iter().cloned())
            .collect();

        AggregateSnapshot {
            per_upstream,
            combined,
        }
    }

    /// Concatenation of every upstream's list, in upstream order.
    pub fn combined(&self) -> &[ProxyOutbound] {
        &self.combined
    }

    pub fn upstream(&self, url: &str) -> Option<&[ProxyOutbound]> {
        self.per_upstream.get(url).map(|list| &list[..])
    }

    pub fn upstreams(&self) -> impl Iterator<Item = (&str, &[ProxyOutbound])> {
        self.per_upstream
            .iter()
            .map(|(url, list)| (url.as_str(), &list[..]))
    }

    pub fn len(&self) -> usize {
        self.combined.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combined.is_empty()
    }
}

pub struct AggregateStore {
    per_upstream: Mutex<UpstreamMap>,
    published: ArcSwap<AggregateSnapshot>,
}

impl AggregateStore {
    pub fn new() -> Self {
        AggregateStore {
            per_upstream: Mutex::new(IndexMap::new()),
            published: ArcSwap::from_pointee(AggregateSnapshot::default()),
        }
    }

    /// Replaces the outbounds of `url` and republishes the snapshot.
    pub fn update_upstream(&self, url: &str, outbounds: Vec<ProxyOutbound>) {
        let mut map = self.per_upstream.lock();
        map.insert(url.to_string(), outbounds.into());
        self.publish(&map);
    }

    /// Like `update_upstream`, but only if `scope` has not been cancelled.
    ///
    /// The check happens under the store lock, so once a reload has cancelled
    /// `scope` and cleared the store, no write from that scope can land.
    /// Returns whether the write was applied.
    pub fn update_upstream_scoped(
        &self,
        url: &str,
        outbounds: Vec<ProxyOutbound>,
        scope: &CancellationToken,
    ) -> bool {
        let mut map = self.per_upstream.lock();
        if scope.is_cancelled() {
            return false;
        }
        map.insert(url.to_string(), outbounds.into());
        self.publish(&map);
        true
    }

    /// Drops every upstream and publishes an empty snapshot.
    pub fn clear(&self) {
        let mut map = self.per_upstream.lock();
        map.clear();
        self.publish(&map);
    }

    /// The latest published snapshot. Never blocks.
    pub fn snapshot(&self) -> Arc<AggregateSnapshot> {
        self.published.load_full()
    }

    /// The combined outbound list of the latest snapshot.
    pub fn outbounds(&self) -> Vec<ProxyOutbound> {
        self.published.load().combined().to_vec()
    }

    /// The subset of the combined list decoded from `format`.
    pub fn outbounds_of(&self, format: SubscriptionFormat) -> Vec<ProxyOutbound> {
        self.published
            .load()
            .combined()
            .iter()
            .filter(|p| p.format() == format)
            .cloned()
            .collect()
    }

    /// The combined list converted to descriptors. Entries that fail to
    /// convert are skipped.
    pub fn descriptors(&self) -> Vec<Outbound> {
        self.published
            .load()
            .combined()
            .iter()
            .filter_map(|p| match p.to_outbound() {
                Ok(outbound) => Some(outbound),
                Err(e) => {
                    tracing::debug!(name = p.name(), error = %e, "skipping unconvertible outbound");
                    None
                }
            })
            .collect()
    }

    fn publish(&self, map: &UpstreamMap) {
        let snapshot = AggregateSnapshot::build(map.clone());
        gauge!(SNAPSHOT_OUTBOUNDS).set(snapshot.len() as f64);
        self.published.store(Arc::new(snapshot));
    }
}

impl Default for AggregateStore {
    fn default() -> Self {
        Self::new()
    }
}
