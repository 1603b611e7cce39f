//! Metrics definitions for the ping relay.

use shared::metrics_defs::{MetricDef, MetricType};

pub const PING_REQUESTS: MetricDef = MetricDef {
    name: "ping.requests",
    metric_type: MetricType::Counter,
    description: "Number of ping requests handled. Tagged with outcome.",
};

pub const PING_DURATION: MetricDef = MetricDef {
    name: "ping.duration",
    metric_type: MetricType::Histogram,
    description: "Round trip of successful appservice pings in seconds",
};

pub const PINGS_INFLIGHT: MetricDef = MetricDef {
    name: "ping.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of probes currently waiting on an appservice",
};

pub const ALL_METRICS: &[MetricDef] = &[PING_REQUESTS, PING_DURATION, PINGS_INFLIGHT];
