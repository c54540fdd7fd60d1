use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub tracking_connections_total: IntCounterVec,
    pub rejected_connections_total: IntCounterVec,
    pub active_connections: IntGauge,
    pub location_updates_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let tracking_connections_total = IntCounterVec::new(
            Opts::new(
                "tracking_connections_total",
                "Accepted tracking connections by role",
            ),
            &["role"],
        )
        .expect("valid tracking_connections_total metric");

        let rejected_connections_total = IntCounterVec::new(
            Opts::new(
                "rejected_connections_total",
                "Rejected tracking connections by reason",
            ),
            &["reason"],
        )
        .expect("valid rejected_connections_total metric");

        let active_connections = IntGauge::new(
            "active_connections",
            "Currently open tracking connections",
        )
        .expect("valid active_connections metric");

        let location_updates_total = IntCounterVec::new(
            Opts::new(
                "location_updates_total",
                "Inbound location updates by outcome",
            ),
            &["outcome"],
        )
        .expect("valid location_updates_total metric");

        registry
            .register(Box::new(tracking_connections_total.clone()))
            .expect("register tracking_connections_total");
        registry
            .register(Box::new(rejected_connections_total.clone()))
            .expect("register rejected_connections_total");
        registry
            .register(Box::new(active_connections.clone()))
            .expect("register active_connections");
        registry
            .register(Box::new(location_updates_total.clone()))
            .expect("register location_updates_total");

        Self {
            registry,
            tracking_connections_total,
            rejected_connections_total,
            active_connections,
            location_updates_total,
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
