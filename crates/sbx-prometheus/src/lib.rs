//! Prometheus backend for the routing layer metrics.
//!
//! [`PrometheusMetrics`] implements [`sbx_core::metrics::MetricsBackend`]; inject it
//! into the route cache, routing filter and consumer, then expose
//! [`PrometheusMetrics::encode_text`] from an HTTP endpoint (`sbx-api` serves it
//! under `/metrics`).
//!
//! ## Metrics
//! - `sbx_routing_decisions_total{role, outcome}` - Counter
//! - `sbx_route_refresh_total{status}` - Counter
//! - `sbx_route_refresh_duration_seconds{status}` - Histogram
//! - `sbx_route_active_keys` - Gauge
//! - `sbx_source_errors_total{operation}` - Counter
//!
//! Routing keys are never used as label values.

mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
