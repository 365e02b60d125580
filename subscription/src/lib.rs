//! Polling of proxy subscriptions and aggregation of their outbounds.
//!
//! Each configured upstream is polled by its own `Fetcher` task. Documents
//! are decoded by the first parser in `parse::PARSERS` that yields anything
//! after keyword filtering, and the resulting `ProxyOutbound` list replaces
//! the upstream's entry in the shared `AggregateStore`. Readers take
//! lock-free snapshots of the store; the `Coordinator` owns the fetcher set
//! and swaps it out on reload.

pub mod config;
pub mod coordinator;
pub mod fetcher;
pub mod metrics_defs;
pub mod outbound;
pub mod parse;
pub mod proxy;
pub mod source;
pub mod store;

#[cfg(test)]
mod testutils;

pub use config::{ConfigError, UpstreamConfig};
pub use coordinator::{Coordinator, ReloadSummary};
pub use fetcher::{FetchCycleError, Fetcher, fetch_once};
pub use outbound::{ConversionError, Outbound, OutboundOptions};
pub use proxy::{ProxyOutbound, SubscriptionFormat};
pub use source::{DocumentSource, FetchError, HttpSource};
pub use store::{AggregateSnapshot, AggregateStore};
