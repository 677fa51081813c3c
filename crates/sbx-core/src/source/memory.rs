//! In-process message queue with long-poll receive and visibility timeouts.
//!
//! Behaves like a hosted work queue: a received message is hidden until it is
//! finalized, released, or its visibility timeout expires.
use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    sync::Notify,
    time::{Instant, sleep_until},
};
use tracing::trace;

use crate::source::{Delivery, MessageSource, Metadata, SourceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryQueueConfig {
    /// Longest a `receive` call waits for a message.
    pub wait_time: Duration,
    /// How long a received message stays hidden before it is handed out again.
    pub visibility_timeout: Duration,
}

impl Default for MemoryQueueConfig {
    fn default() -> Self {
        Self {
            wait_time: Duration::from_secs(20),
            visibility_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
struct Stored {
    id: String,
    body: Vec<u8>,
    metadata: Metadata,
    receive_count: u32,
}

#[derive(Debug)]
struct InFlight {
    message: Stored,
    visible_at: Instant,
}

#[derive(Debug, Default)]
struct State {
    ready: VecDeque<Stored>,
    in_flight: HashMap<String, InFlight>,
    next_id: u64,
    next_receipt: u64,
}

impl State {
    /// Move every in-flight message whose visibility expired back to the queue.
    fn reclaim(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, f)| f.visible_at <= now)
            .map(|(r, _)| r.clone())
            .collect();
        for receipt in expired {
            if let Some(f) = self.in_flight.remove(&receipt) {
                trace!(message_id = %f.message.id, "visibility timeout expired");
                self.ready.push_back(f.message);
            }
        }
    }

    fn next_visible_at(&self) -> Option<Instant> {
        self.in_flight.values().map(|f| f.visible_at).min()
    }
}

/// In-memory [`MessageSource`].
#[derive(Debug, Default)]
pub struct MemoryQueue {
    cfg: MemoryQueueConfig,
    state: Mutex<State>,
    notify: Notify,
}

impl MemoryQueue {
    pub fn new(cfg: MemoryQueueConfig) -> Self {
        Self {
            cfg,
            state: Mutex::new(State::default()),
            notify: Notify::new(),
        }
    }

    pub fn config(&self) -> &MemoryQueueConfig {
        &self.cfg
    }

    /// Enqueue a message and return its id.
    pub fn send(&self, body: impl Into<Vec<u8>>, metadata: impl Into<Metadata>) -> String {
        let id = {
            let mut state = self.lock();
            state.next_id += 1;
            let id = format!("msg-{}", state.next_id);
            state.ready.push_back(Stored {
                id: id.clone(),
                body: body.into(),
                metadata: metadata.into(),
                receive_count: 0,
            });
            id
        };
        self.notify.notify_waiters();
        id
    }

    /// Messages waiting to be received.
    pub fn len(&self) -> usize {
        self.lock().ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages received but neither finalized, released nor expired.
    pub fn in_flight_len(&self) -> usize {
        self.lock().in_flight.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_take(&self, now: Instant) -> Result<Delivery, Option<Instant>> {
        let mut state = self.lock();
        state.reclaim(now);

        let Some(mut message) = state.ready.pop_front() else {
            return Err(state.next_visible_at());
        };
        message.receive_count += 1;
        state.next_receipt += 1;
        let receipt = format!("rcpt-{}", state.next_receipt);

        let delivery = Delivery {
            receipt: receipt.clone(),
            message_id: message.id.clone(),
            body: message.body.clone(),
            metadata: message.metadata.clone(),
            receive_count: message.receive_count,
        };
        state.in_flight.insert(
            receipt,
            InFlight {
                message,
                visible_at: now + self.cfg.visibility_timeout,
            },
        );
        Ok(delivery)
    }
}

#[async_trait]
impl MessageSource for MemoryQueue {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn receive(&self) -> Result<Option<Delivery>, SourceError> {
        let deadline = Instant::now() + self.cfg.wait_time;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let now = Instant::now();
            let next_visible = match self.try_take(now) {
                Ok(delivery) => return Ok(Some(delivery)),
                Err(next_visible) => next_visible,
            };
            if now >= deadline {
                return Ok(None);
            }

            let wake = next_visible.map_or(deadline, |t| t.min(deadline));
            tokio::select! {
                _ = &mut notified => {}
                _ = sleep_until(wake) => {}
            }
        }
    }

    async fn release(&self, delivery: &Delivery) -> Result<(), SourceError> {
        {
            let mut state = self.lock();
            let f = state
                .in_flight
                .remove(&delivery.receipt)
                .ok_or_else(|| SourceError::UnknownReceipt(delivery.receipt.clone()))?;
            // Behind everything already waiting, so a consumer that keeps
            // skipping one message still reaches the ones after it.
            state.ready.push_back(f.message);
        }
        self.notify.notify_waiters();
        Ok(())
    }

    async fn finalize(&self, delivery: &Delivery) -> Result<(), SourceError> {
        self.lock()
            .in_flight
            .remove(&delivery.receipt)
            .map(|_| ())
            .ok_or_else(|| SourceError::UnknownReceipt(delivery.receipt.clone()))
    }
}
