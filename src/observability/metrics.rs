use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub quotes_total: IntCounterVec,
    pub distance_fallbacks_total: IntCounterVec,
    pub holds_total: IntCounterVec,
    pub commits_total: IntCounterVec,
    pub schema_retries_total: IntCounterVec,
    pub tracking_id_collisions_total: IntCounter,
    pub quote_latency_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let quotes_total = IntCounterVec::new(
            Opts::new("quotes_total", "Quote attempts by outcome"),
            &["outcome"],
        )
        .expect("valid quotes_total metric");

        let distance_fallbacks_total = IntCounterVec::new(
            Opts::new(
                "distance_fallbacks_total",
                "Quotes priced with the fallback distance, by failure reason",
            ),
            &["reason"],
        )
        .expect("valid distance_fallbacks_total metric");

        let holds_total = IntCounterVec::new(
            Opts::new("holds_total", "Pending holds by persistence path"),
            &["path"],
        )
        .expect("valid holds_total metric");

        let commits_total = IntCounterVec::new(
            Opts::new("commits_total", "Package commits by outcome"),
            &["outcome"],
        )
        .expect("valid commits_total metric");

        let schema_retries_total = IntCounterVec::new(
            Opts::new(
                "schema_retries_total",
                "Writes retried without optional fields",
            ),
            &["table"],
        )
        .expect("valid schema_retries_total metric");

        let tracking_id_collisions_total = IntCounter::new(
            "tracking_id_collisions_total",
            "Tracking ids regenerated after a key conflict",
        )
        .expect("valid tracking_id_collisions_total metric");

        let quote_latency_seconds = Histogram::with_opts(HistogramOpts::new(
            "quote_latency_seconds",
            "Latency of quoting, including distance resolution",
        ))
        .expect("valid quote_latency_seconds metric");

        registry
            .register(Box::new(quotes_total.clone()))
            .expect("register quotes_total");
        registry
            .register(Box::new(distance_fallbacks_total.clone()))
            .expect("register distance_fallbacks_total");
        registry
            .register(Box::new(holds_total.clone()))
            .expect("register holds_total");
        registry
            .register(Box::new(commits_total.clone()))
            .expect("register commits_total");
        registry
            .register(Box::new(schema_retries_total.clone()))
            .expect("register schema_retries_total");
        registry
            .register(Box::new(tracking_id_collisions_total.clone()))
            .expect("register tracking_id_collisions_total");
        registry
            .register(Box::new(quote_latency_seconds.clone()))
            .expect("register quote_latency_seconds");

        Self {
            registry,
            quotes_total,
            distance_fallbacks_total,
            holds_total,
            commits_total,
            schema_retries_total,
            tracking_id_collisions_total,
            quote_latency_seconds,
        }
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
