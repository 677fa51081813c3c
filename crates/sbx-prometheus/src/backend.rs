use std::sync::Arc;

use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntGauge, Opts, Registry, TextEncoder,
    proto::MetricFamily,
};

use sbx_core::metrics::{DecisionOutcome, MetricsBackend, RefreshStatus};

const NAMESPACE: &str = "sbx";

/// Prometheus metrics backend.
///
/// ## Label cardinality
/// - `role`: "baseline", "sandbox"
/// - `outcome`: "accept", "skip"
/// - `status`: "success", "failure", "timeout"
/// - `operation`: "receive", "release", "finalize"
#[derive(Clone)]
pub struct PrometheusMetrics {
    decisions: CounterVec,
    refreshes: CounterVec,
    refresh_duration: HistogramVec,
    active_keys: IntGauge,
    source_errors: CounterVec,
    registry: Arc<Registry>,
}

impl PrometheusMetrics {
    /// Create the backend and register its collectors in `registry`.
    pub fn new_with_registry(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let decisions = CounterVec::new(
            Opts::new("routing_decisions_total", "Routing decisions by role and outcome")
                .namespace(NAMESPACE),
            &["role", "outcome"],
        )?;
        registry.register(Box::new(decisions.clone()))?;

        let refreshes = CounterVec::new(
            Opts::new("route_refresh_total", "Routing-rules fetches by status")
                .namespace(NAMESPACE),
            &["status"],
        )?;
        registry.register(Box::new(refreshes.clone()))?;

        let refresh_duration = HistogramVec::new(
            HistogramOpts::new(
                "route_refresh_duration_seconds",
                "Routing-rules fetch duration in seconds",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["status"],
        )?;
        registry.register(Box::new(refresh_duration.clone()))?;

        let active_keys = IntGauge::with_opts(
            Opts::new(
                "route_active_keys",
                "Routing keys claimed by active sandboxes in the current snapshot",
            )
            .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(active_keys.clone()))?;

        let source_errors = CounterVec::new(
            Opts::new("source_errors_total", "Message source failures by operation")
                .namespace(NAMESPACE),
            &["operation"],
        )?;
        registry.register(Box::new(source_errors.clone()))?;

        Ok(Self {
            decisions,
            refreshes,
            refresh_duration,
            active_keys,
            source_errors,
            registry,
        })
    }

    /// Create the backend with a private registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::new_with_registry(Arc::new(Registry::new()))
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Render every registered metric in the text exposition format.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// Underlying registry, for registering application metrics alongside.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_decision(&self, role: &str, outcome: DecisionOutcome) {
        self.decisions
            .with_label_values(&[role, outcome.as_label()])
            .inc();
    }

    fn record_refresh(&self, status: RefreshStatus, duration_ms: u64) {
        self.refreshes.with_label_values(&[status.as_label()]).inc();
        self.refresh_duration
            .with_label_values(&[status.as_label()])
            .observe(duration_ms as f64 / 1000.0);
    }

    fn record_active_keys(&self, count: usize) {
        self.active_keys
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    fn record_source_error(&self, operation: &str) {
        self.source_errors.with_label_values(&[operation]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family<'a>(families: &'a [MetricFamily], name: &str) -> &'a MetricFamily {
        families
            .iter()
            .find(|f| f.name() == name)
            .unwrap_or_else(|| panic!("metric {name} not found"))
    }

    #[test]
    fn decisions_are_labelled_by_role_and_outcome() {
        let metrics = PrometheusMetrics::new().unwrap();

        metrics.record_decision("baseline", DecisionOutcome::Accept);
        metrics.record_decision("baseline", DecisionOutcome::Accept);
        metrics.record_decision("baseline", DecisionOutcome::Skip);
        metrics.record_decision("sandbox", DecisionOutcome::Accept);

        let families = metrics.gather();
        let decisions = family(&families, "sbx_routing_decisions_total");
        assert_eq!(decisions.get_metric().len(), 3);
    }

    #[test]
    fn refresh_records_counter_and_histogram() {
        let metrics = PrometheusMetrics::new().unwrap();

        metrics.record_refresh(RefreshStatus::Success, 12);
        metrics.record_refresh(RefreshStatus::Timeout, 5000);

        let families = metrics.gather();
        assert_eq!(family(&families, "sbx_route_refresh_total").get_metric().len(), 2);
        assert_eq!(
            family(&families, "sbx_route_refresh_duration_seconds")
                .get_metric()
                .len(),
            2
        );
    }

    #[test]
    fn active_keys_gauge_tracks_last_value() {
        let metrics = PrometheusMetrics::new().unwrap();

        metrics.record_active_keys(7);
        metrics.record_active_keys(3);

        let families = metrics.gather();
        let gauge = family(&families, "sbx_route_active_keys");
        assert_eq!(gauge.get_metric()[0].get_gauge().value(), 3.0);
    }

    #[test]
    fn text_exposition_contains_source_errors() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_source_error("receive");

        let text = metrics.encode_text().unwrap();
        assert!(text.contains(r#"sbx_source_errors_total{operation="receive"} 1"#));
    }

    #[test]
    fn duplicate_registration_fails() {
        let registry = Arc::new(Registry::new());
        PrometheusMetrics::new_with_registry(registry.clone()).unwrap();
        assert!(PrometheusMetrics::new_with_registry(registry).is_err());
    }
}
