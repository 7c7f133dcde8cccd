use prometheus::{Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub updates_total: IntCounterVec,
    pub ingest_latency_seconds: HistogramVec,
    pub active_sessions: IntGauge,
    pub audit_log_size: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let updates_total = IntCounterVec::new(
            Opts::new(
                "tracking_updates_total",
                "Total ingested tracking updates by outcome",
            ),
            &["outcome"],
        )
        .expect("valid tracking_updates_total metric");

        let ingest_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "ingest_latency_seconds",
                "Latency of tracking update ingestion in seconds",
            ),
            &["outcome"],
        )
        .expect("valid ingest_latency_seconds metric");

        let active_sessions = IntGauge::new(
            "active_delivery_sessions",
            "Number of currently active delivery sessions",
        )
        .expect("valid active_delivery_sessions metric");

        let audit_log_size = IntGauge::new(
            "audit_log_size",
            "Number of entries in the tracking update log",
        )
        .expect("valid audit_log_size metric");

        registry
            .register(Box::new(updates_total.clone()))
            .expect("register tracking_updates_total");
        registry
            .register(Box::new(ingest_latency_seconds.clone()))
            .expect("register ingest_latency_seconds");
        registry
            .register(Box::new(active_sessions.clone()))
            .expect("register active_delivery_sessions");
        registry
            .register(Box::new(audit_log_size.clone()))
            .expect("register audit_log_size");

        Self {
            registry,
            updates_total,
            ingest_latency_seconds,
            active_sessions,
            audit_log_size,
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
