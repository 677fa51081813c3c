//! Receive loop: pulls messages, routes them and drives the handler.
//!
//! Contract per message:
//! - skipped messages are released (or discarded in fan-out) right away;
//! - accepted messages are finalized only after the handler succeeds;
//! - a failed handler leaves the message to the source's redelivery.
use std::{collections::HashSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    baggage::extract_routing_key,
    carrier::Carrier,
    decision::{Decision, ReleaseAction, RoutingFilter},
    metrics::{MetricsHandle, noop_metrics},
    source::{Delivery, MessageSource},
};

/// Business logic invoked for every accepted message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: &[u8], carrier: Carrier<'_>) -> anyhow::Result<()>;
}

/// What happened to one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Handler succeeded.
    Processed,
    /// Handler failed; the message was not finalized.
    HandlerFailed,
    /// Skipped and made visible to other consumers.
    Released,
    /// Skipped and acknowledged for this instance only.
    Discarded,
}

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub received: u64,
    pub accepted: u64,
    pub skipped: u64,
    pub handler_failures: u64,
    pub source_errors: u64,
}

pub struct Consumer<S, H> {
    source: Arc<S>,
    handler: Arc<H>,
    filter: RoutingFilter,
    receive_backoff: Duration,
    metrics: MetricsHandle,
}

impl<S, H> Consumer<S, H>
where
    S: MessageSource + 'static,
    H: MessageHandler + 'static,
{
    pub fn new(source: Arc<S>, handler: Arc<H>, filter: RoutingFilter) -> Self {
        Self {
            source,
            handler,
            filter,
            receive_backoff: Duration::from_secs(1),
            metrics: noop_metrics(),
        }
    }

    /// Pause after a failed `receive`, or after every visible message was
    /// skipped once in a row, before receiving again.
    pub fn with_receive_backoff(mut self, backoff: Duration) -> Self {
        self.receive_backoff = backoff;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn filter(&self) -> &RoutingFilter {
        &self.filter
    }

    /// Receive and dispatch until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> ConsumerStats {
        let mut stats = ConsumerStats::default();
        // Messages released since the last one this instance kept.
        let mut released: HashSet<String> = HashSet::new();
        info!(
            source = self.source.name(),
            role = %self.filter.role(),
            mode = %self.filter.delivery_mode(),
            "consumer started"
        );

        loop {
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                r = self.source.receive() => r,
            };

            let delivery = match received {
                Ok(Some(d)) => d,
                Ok(None) => {
                    debug!("no messages received");
                    released.clear();
                    continue;
                }
                Err(e) => {
                    stats.source_errors += 1;
                    self.metrics.record_source_error("receive");
                    error!(error = %e, backoff_ms = self.receive_backoff.as_millis() as u64, "receive failed");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.receive_backoff) => continue,
                    }
                }
            };

            stats.received += 1;
            match self.handle_delivery(&delivery).await {
                DeliveryOutcome::Processed => {
                    stats.accepted += 1;
                    released.clear();
                }
                DeliveryOutcome::HandlerFailed => {
                    stats.accepted += 1;
                    stats.handler_failures += 1;
                    released.clear();
                }
                DeliveryOutcome::Released => {
                    stats.skipped += 1;
                    if released.insert(delivery.message_id.clone()) {
                        // Let competing consumers pick up the released message.
                        tokio::task::yield_now().await;
                        continue;
                    }
                    // Back to a message already skipped: nothing visible is ours.
                    released.clear();
                    debug!(
                        backoff_ms = self.receive_backoff.as_millis() as u64,
                        "only foreign messages visible"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.receive_backoff) => {}
                    }
                }
                DeliveryOutcome::Discarded => {
                    stats.skipped += 1;
                    released.clear();
                }
            }
        }

        info!(
            received = stats.received,
            accepted = stats.accepted,
            skipped = stats.skipped,
            handler_failures = stats.handler_failures,
            source_errors = stats.source_errors,
            "consumer stopped"
        );
        stats
    }

    /// Route one delivery and act on the decision.
    ///
    /// Release and finalize failures are logged; they never stop the loop.
    #[instrument(level = "debug", skip_all, fields(message_id = %delivery.message_id))]
    pub async fn handle_delivery(&self, delivery: &Delivery) -> DeliveryOutcome {
        let carrier = delivery.carrier();
        let routing_key = extract_routing_key(&carrier);

        match self.filter.decide(routing_key.as_deref()).await {
            Decision::Skip(ReleaseAction::MakeVisible) => {
                if let Err(e) = self.source.release(delivery).await {
                    self.metrics.record_source_error("release");
                    warn!(error = %e, "failed to release skipped message");
                }
                DeliveryOutcome::Released
            }
            Decision::Skip(ReleaseAction::Discard) => {
                if let Err(e) = self.source.finalize(delivery).await {
                    self.metrics.record_source_error("finalize");
                    warn!(error = %e, "failed to discard skipped message");
                }
                DeliveryOutcome::Discarded
            }
            Decision::Accept => match self.handler.handle(&delivery.body, carrier).await {
                Ok(()) => {
                    if let Err(e) = self.source.finalize(delivery).await {
                        self.metrics.record_source_error("finalize");
                        warn!(error = %e, "failed to finalize processed message");
                    }
                    DeliveryOutcome::Processed
                }
                Err(e) => {
                    error!(
                        error = %e,
                        receive_count = delivery.receive_count,
                        "handler failed, message left for redelivery"
                    );
                    DeliveryOutcome::HandlerFailed
                }
            },
        }
    }
}
