use async_trait::async_trait;
use tokio::time::Instant;

use sbx_core::{
    cache::RefreshOutcome,
    decision::{Decision, RoutingFilter, decide},
};
use sbx_prometheus::PrometheusMetrics;

use crate::{
    error::ApiError,
    handler::{RoutingHandler, RoutingStatus},
};

/// Serves the status API from a live [`RoutingFilter`].
///
/// Shares the filter's route cache with the consumer, so refreshes triggered
/// here are coalesced with the consumer's own.
pub struct RouterAdapter {
    filter: RoutingFilter,
    metrics: Option<PrometheusMetrics>,
}

impl RouterAdapter {
    pub fn new(filter: RoutingFilter) -> Self {
        Self {
            filter,
            metrics: None,
        }
    }

    /// Expose `metrics` under `/metrics`.
    pub fn with_metrics(mut self, metrics: PrometheusMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

#[async_trait]
impl RoutingHandler for RouterAdapter {
    fn status(&self) -> RoutingStatus {
        RoutingStatus::from_filter(&self.filter, Instant::now())
    }

    async fn refresh(&self) -> RefreshOutcome {
        self.filter.cache().ensure_fresh().await
    }

    fn decide(&self, routing_key: Option<&str>) -> Decision {
        let snapshot = self.filter.cache().snapshot();
        decide(
            self.filter.role(),
            routing_key,
            snapshot.active_keys(),
            self.filter.delivery_mode(),
        )
    }

    fn metrics(&self) -> Result<String, ApiError> {
        let metrics = self.metrics.as_ref().ok_or(ApiError::NotEnabled("metrics"))?;
        metrics
            .encode_text()
            .map_err(|e| ApiError::Internal(e.to_string()))
    }
}
