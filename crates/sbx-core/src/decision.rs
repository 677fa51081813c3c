//! Routing decision engine.
//!
//! Decides whether this instance should process a message given its role, the
//! message's routing key and the set of keys claimed by active sandboxes.
use std::{collections::HashSet, sync::Arc};

use tracing::info;

use sbx_model::{DeliveryMode, InstanceRole};

use crate::{
    cache::RouteCache,
    metrics::{DecisionOutcome, MetricsHandle, noop_metrics},
};

/// Core routing rule. Pure, no I/O.
///
/// - A sandbox processes only messages carrying its own routing key.
/// - The baseline processes untagged messages and messages whose key is not
///   claimed by any active sandbox.
pub fn should_process(
    role: &InstanceRole,
    routing_key: Option<&str>,
    active_keys: &HashSet<String>,
) -> bool {
    match role {
        InstanceRole::Sandbox(sandbox) => routing_key == Some(sandbox.routing_key.as_str()),
        InstanceRole::Baseline => match routing_key {
            None => true,
            Some(key) => !active_keys.contains(key),
        },
    }
}

/// What to do with a message this instance does not process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseAction {
    /// Make the message visible again for other consumers (shared queue).
    MakeVisible,
    /// Acknowledge this instance's own copy (fan-out).
    Discard,
}

impl From<DeliveryMode> for ReleaseAction {
    fn from(mode: DeliveryMode) -> Self {
        match mode {
            DeliveryMode::SharedQueue => ReleaseAction::MakeVisible,
            DeliveryMode::FanOut => ReleaseAction::Discard,
        }
    }
}

/// Routing decision for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// Hand the message to the business handler.
    Accept,
    /// Do not process; release it as described.
    Skip(ReleaseAction),
}

impl Decision {
    pub fn is_accept(&self) -> bool {
        matches!(self, Decision::Accept)
    }

    pub fn outcome(&self) -> DecisionOutcome {
        match self {
            Decision::Accept => DecisionOutcome::Accept,
            Decision::Skip(_) => DecisionOutcome::Skip,
        }
    }
}

/// [`should_process`] plus the release action for skipped messages.
pub fn decide(
    role: &InstanceRole,
    routing_key: Option<&str>,
    active_keys: &HashSet<String>,
    mode: DeliveryMode,
) -> Decision {
    if should_process(role, routing_key, active_keys) {
        Decision::Accept
    } else {
        Decision::Skip(mode.into())
    }
}

/// Role, route cache and delivery mode bound together.
///
/// This is what a receive loop calls for every message.
#[derive(Clone)]
pub struct RoutingFilter {
    role: InstanceRole,
    cache: Arc<RouteCache>,
    mode: DeliveryMode,
    metrics: MetricsHandle,
}

impl RoutingFilter {
    pub fn new(role: InstanceRole, cache: Arc<RouteCache>) -> Self {
        Self {
            role,
            cache,
            mode: DeliveryMode::default(),
            metrics: noop_metrics(),
        }
    }

    pub fn with_delivery_mode(mut self, mode: DeliveryMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn role(&self) -> &InstanceRole {
        &self.role
    }

    pub fn cache(&self) -> &Arc<RouteCache> {
        &self.cache
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Refresh the cache if stale, then decide.
    ///
    /// A sandbox decision does not depend on the active keys, so only the
    /// baseline refreshes here. Before the first successful refresh the active
    /// set is empty.
    pub async fn decide(&self, routing_key: Option<&str>) -> Decision {
        if self.role.is_baseline() {
            self.cache.ensure_fresh().await;
        }
        self.decide_cached(routing_key)
    }

    /// Decide against the current snapshot without suspending.
    pub fn decide_cached(&self, routing_key: Option<&str>) -> Decision {
        let snapshot = self.cache.snapshot();
        let decision = decide(&self.role, routing_key, snapshot.active_keys(), self.mode);

        info!(
            role = %self.role,
            routing_key = routing_key.unwrap_or(""),
            decision = ?decision,
            version = snapshot.version(),
            "routing decision"
        );
        self.metrics
            .record_decision(self.role.label(), decision.outcome());
        decision
    }
}
