use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with status, strategy.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of requests currently being processed",
};

pub const UPSTREAM_FETCHES: MetricDef = MetricDef {
    name: "upstream.fetches",
    metric_type: MetricType::Counter,
    description: "Completed upstream fetches. Tagged with outcome.",
};

pub const UPSTREAM_ABANDONED: MetricDef = MetricDef {
    name: "upstream.abandoned",
    metric_type: MetricType::Counter,
    description: "Upstream fetches aborted because the request deadline fired first",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    REQUESTS_INFLIGHT,
    UPSTREAM_FETCHES,
    UPSTREAM_ABANDONED,
];
