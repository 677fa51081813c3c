use std::sync::Arc;

/// Result of one routing-rules fetch, for metrics classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStatus {
    /// Rules fetched and applied.
    Success,
    /// Transport error, bad status or malformed body.
    Failure,
    /// Fetch did not complete within the configured bound.
    Timeout,
}

impl RefreshStatus {
    /// Return label value for metrics.
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            RefreshStatus::Success => "success",
            RefreshStatus::Failure => "failure",
            RefreshStatus::Timeout => "timeout",
        }
    }
}

/// Per-message routing outcome, for metrics classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOutcome {
    /// Message handed to the business handler.
    Accept,
    /// Message released for another instance.
    Skip,
}

impl DecisionOutcome {
    /// Return label value for metrics.
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            DecisionOutcome::Accept => "accept",
            DecisionOutcome::Skip => "skip",
        }
    }
}

/// Backend metrics collection interface.
///
/// All label values passed by the routing layer are bounded (low cardinality);
/// routing keys themselves are never used as labels.
pub trait MetricsBackend: Send + Sync + 'static {
    /// Record a routing decision.
    ///
    /// # Arguments
    /// - `role`: `"baseline"` or `"sandbox"`
    /// - `outcome`: accept or skip
    fn record_decision(&self, role: &str, outcome: DecisionOutcome);
    /// Record a routing-rules fetch with its outcome and duration.
    fn record_refresh(&self, status: RefreshStatus, duration_ms: u64);
    /// Record the size of the active key set after a successful refresh.
    fn record_active_keys(&self, count: usize);
    /// Record a message-source failure.
    ///
    /// # Arguments
    /// - `operation`: `"receive"`, `"release"` or `"finalize"`
    fn record_source_error(&self, operation: &str);
}

/// Shared handle to metrics backend.
pub type MetricsHandle = Arc<dyn MetricsBackend>;
