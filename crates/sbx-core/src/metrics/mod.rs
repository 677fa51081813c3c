//! Metrics collection abstraction for the routing layer.
//!
//! Backends (prometheus, statsd, etc) implement [`MetricsBackend`] and are injected into
//! the route cache, routing filter and consumer loop.
mod backend;
pub use backend::{DecisionOutcome, MetricsBackend, MetricsHandle, RefreshStatus};

mod noop;
pub use noop::NoOpMetrics;

use std::sync::Arc;

/// Create a no-op metrics handle.
#[inline]
pub fn noop_metrics() -> MetricsHandle {
    Arc::new(NoOpMetrics)
}
