use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sbx_core::{cache::RefreshOutcome, decision::Decision};
use sbx_model::{DeliveryMode, WorkloadIdentity};

use crate::error::ApiError;

/// Routing state as reported by `GET /api/v1/routing`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingStatus {
    /// `"baseline"` or `"sandbox"`.
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_key: Option<String>,
    pub workload: WorkloadIdentity,
    pub delivery_mode: DeliveryMode,
    /// Keys claimed by active sandboxes, sorted.
    pub active_keys: Vec<String>,
    pub version: u64,
    pub has_completed_first_update: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_since_update: Option<f64>,
    /// A refresh is in flight right now.
    pub refreshing: bool,
}

/// Outcome of a dry-run decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecideResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_key: Option<String>,
    pub process: bool,
    /// `"make-visible"` or `"discard"` when skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
}

impl DecideResult {
    pub fn new(routing_key: Option<String>, decision: Decision) -> Self {
        use sbx_core::decision::ReleaseAction;

        let release = match decision {
            Decision::Accept => None,
            Decision::Skip(ReleaseAction::MakeVisible) => Some("make-visible".to_string()),
            Decision::Skip(ReleaseAction::Discard) => Some("discard".to_string()),
        };
        Self {
            routing_key,
            process: decision.is_accept(),
            release,
        }
    }
}

/// Backend of the status API.
///
/// [`crate::RouterAdapter`] serves a live routing filter; tests and embedders may
/// provide their own.
#[async_trait]
pub trait RoutingHandler: Send + Sync + 'static {
    /// Current routing state. Must not perform I/O.
    fn status(&self) -> RoutingStatus;

    /// Refresh the route cache if stale.
    async fn refresh(&self) -> RefreshOutcome;

    /// Decide against the cached snapshot without refreshing or recording metrics.
    fn decide(&self, routing_key: Option<&str>) -> Decision;

    /// Prometheus text exposition.
    fn metrics(&self) -> Result<String, ApiError>;
}
