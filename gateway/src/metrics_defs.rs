//! Metrics definitions for the gateway.

use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Download request duration in seconds. Tagged with status.",
};

pub const RUN_CACHE_HIT: MetricDef = MetricDef {
    name: "run_cache.hit",
    metric_type: MetricType::Counter,
    description: "Number of run lookups answered from a fresh cache entry",
};

pub const RUN_CACHE_MISS: MetricDef = MetricDef {
    name: "run_cache.miss",
    metric_type: MetricType::Counter,
    description: "Number of run lookups that had to query the API",
};

pub const TARGET_LOCK_TIMEOUT: MetricDef = MetricDef {
    name: "target_lock.timeout",
    metric_type: MetricType::Counter,
    description: "Number of requests that gave up waiting for a busy target",
};

pub const UPSTREAM_REQUEST_DURATION: MetricDef = MetricDef {
    name: "upstream.request.duration",
    metric_type: MetricType::Histogram,
    description: "Duration of API calls in seconds. Tagged with operation.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    RUN_CACHE_HIT,
    RUN_CACHE_MISS,
    TARGET_LOCK_TIMEOUT,
    UPSTREAM_REQUEST_DURATION,
];
