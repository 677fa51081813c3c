use crate::metrics::backend::{DecisionOutcome, MetricsBackend, RefreshStatus};

/// No-op metrics backend that compiles to nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl MetricsBackend for NoOpMetrics {
    #[inline(always)]
    fn record_decision(&self, _: &str, _: DecisionOutcome) {}

    #[inline(always)]
    fn record_refresh(&self, _: RefreshStatus, _: u64) {}

    #[inline(always)]
    fn record_active_keys(&self, _: usize) {}

    #[inline(always)]
    fn record_source_error(&self, _: &str) {}
}
