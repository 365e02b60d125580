//! Metrics definitions for subscription polling.

use shared::metrics_defs::{MetricDef, MetricType};

pub const FETCH_SUCCESS: MetricDef = MetricDef {
    name: "upstream.fetch.success",
    metric_type: MetricType::Counter,
    description: "Number of fetch cycles that published outbounds, tagged by upstream and format",
};

pub const FETCH_FAILURE: MetricDef = MetricDef {
    name: "upstream.fetch.failure",
    metric_type: MetricType::Counter,
    description: "Number of fetch cycles where no parser produced outbounds, tagged by upstream",
};

pub const FETCH_DURATION: MetricDef = MetricDef {
    name: "upstream.fetch.duration",
    metric_type: MetricType::Histogram,
    description: "Time to complete one fetch cycle in seconds",
};

pub const FETCH_DISCARDED: MetricDef = MetricDef {
    name: "upstream.fetch.discarded",
    metric_type: MetricType::Counter,
    description: "Fetch results dropped because their reload generation was cancelled",
};

pub const SNAPSHOT_OUTBOUNDS: MetricDef = MetricDef {
    name: "snapshot.outbounds",
    metric_type: MetricType::Gauge,
    description: "Number of outbounds in the published combined snapshot",
};

pub const RELOADS: MetricDef = MetricDef {
    name: "coordinator.reloads",
    metric_type: MetricType::Counter,
    description: "Number of times the upstream fetchers were (re)started",
};

pub const REJECTED_UPSTREAMS: MetricDef = MetricDef {
    name: "coordinator.rejected_upstreams",
    metric_type: MetricType::Counter,
    description: "Upstream entries skipped at (re)load because their configuration was invalid",
};

pub const ALL_METRICS: &[MetricDef] = &[
    FETCH_SUCCESS,
    FETCH_FAILURE,
    FETCH_DURATION,
    FETCH_DISCARDED,
    SNAPSHOT_OUTBOUNDS,
    RELOADS,
    REJECTED_UPSTREAMS,
];
