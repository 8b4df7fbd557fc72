use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub polls_total: IntCounterVec,
    pub transitions_total: IntCounterVec,
    pub location_updates_total: IntCounterVec,
    pub active_sessions: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let polls_total = IntCounterVec::new(
            Opts::new("polls_total", "Backend polls by activity and outcome"),
            &["activity", "outcome"],
        )
        .expect("valid polls_total metric");

        let transitions_total = IntCounterVec::new(
            Opts::new("lifecycle_transitions_total", "Lifecycle phase entries by phase"),
            &["phase"],
        )
        .expect("valid lifecycle_transitions_total metric");

        let location_updates_total = IntCounterVec::new(
            Opts::new(
                "location_updates_total",
                "Geolocation callbacks by outcome (accepted, throttled, error)",
            ),
            &["outcome"],
        )
        .expect("valid location_updates_total metric");

        let active_sessions =
            IntGauge::new("active_pickup_sessions", "Pickup sessions currently in progress")
                .expect("valid active_pickup_sessions metric");

        registry
            .register(Box::new(polls_total.clone()))
            .expect("register polls_total");
        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register lifecycle_transitions_total");
        registry
            .register(Box::new(location_updates_total.clone()))
            .expect("register location_updates_total");
        registry
            .register(Box::new(active_sessions.clone()))
            .expect("register active_pickup_sessions");

        Self {
            registry,
            polls_total,
            transitions_total,
            location_updates_total,
            active_sessions,
        }
    }

    pub fn record_poll(&self, activity: &str, ok: bool) {
        let outcome = if ok { "ok" } else { "error" };
        self.polls_total
            .with_label_values(&[activity, outcome])
            .inc();
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
