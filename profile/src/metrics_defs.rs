use shared::metrics_defs::{MetricDef, MetricType};

pub const PROFILES_SYNTHESIZED: MetricDef = MetricDef {
    name: "profile.synthesized",
    metric_type: MetricType::Counter,
    description: "Number of profile documents synthesized",
};

pub const UNCONVERTIBLE_OUTBOUNDS: MetricDef = MetricDef {
    name: "profile.outbounds.unconvertible",
    metric_type: MetricType::Counter,
    description: "Outbounds left out of a profile because they could not be converted",
};

pub const SKIPPED_GROUPS: MetricDef = MetricDef {
    name: "profile.groups.skipped",
    metric_type: MetricType::Counter,
    description: "Keyword groups left out of a profile because nothing matched",
};

pub const ALL_METRICS: &[MetricDef] = &[PROFILES_SYNTHESIZED, UNCONVERTIBLE_OUTBOUNDS, SKIPPED_GROUPS];
