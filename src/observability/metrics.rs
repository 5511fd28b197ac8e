use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub upstream_requests_total: IntCounterVec,
    pub upstream_latency_seconds: HistogramVec,
    pub assignments_total: IntCounterVec,
    pub status_updates_total: IntCounterVec,
    pub stale_responses_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let upstream_requests_total = IntCounterVec::new(
            Opts::new(
                "upstream_requests_total",
                "Requests made to the delivery API by endpoint and outcome",
            ),
            &["endpoint", "outcome"],
        )
        .expect("valid upstream_requests_total metric");

        let upstream_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "upstream_latency_seconds",
                "Latency of delivery API requests in seconds",
            ),
            &["endpoint"],
        )
        .expect("valid upstream_latency_seconds metric");

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Courier assignments by outcome"),
            &["outcome"],
        )
        .expect("valid assignments_total metric");

        let status_updates_total = IntCounterVec::new(
            Opts::new("status_updates_total", "Delivery status updates by outcome"),
            &["outcome"],
        )
        .expect("valid status_updates_total metric");

        let stale_responses_total = IntCounter::new(
            "stale_responses_total",
            "List responses discarded because a newer one was already applied",
        )
        .expect("valid stale_responses_total metric");

        registry
            .register(Box::new(upstream_requests_total.clone()))
            .expect("register upstream_requests_total");
        registry
            .register(Box::new(upstream_latency_seconds.clone()))
            .expect("register upstream_latency_seconds");
        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(status_updates_total.clone()))
            .expect("register status_updates_total");
        registry
            .register(Box::new(stale_responses_total.clone()))
            .expect("register stale_responses_total");

        Self {
            registry,
            upstream_requests_total,
            upstream_latency_seconds,
            assignments_total,
            status_updates_total,
            stale_responses_total,
        }
    }

    pub fn record_outcome(counter: &IntCounterVec, ok: bool) {
        let outcome = if ok { "success" } else { "error" };
        counter.with_label_values(&[outcome]).inc();
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
