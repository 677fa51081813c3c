use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;

/// Per-cache single-flight slot.
///
/// At most one refresh is in flight; callers arriving meanwhile subscribe to
/// the in-flight completion signal instead of starting their own fetch.
#[derive(Debug, Default)]
pub(crate) struct SingleFlight {
    slot: Mutex<Option<watch::Receiver<bool>>>,
}

/// Role assigned to a caller by [`SingleFlight::join_or_lead`].
pub(crate) enum Flight<'a> {
    /// The caller owns the refresh right until the guard is dropped.
    Leader(FlightGuard<'a>),
    /// Another caller is refreshing; wait on its completion.
    Follower(FlightWaiter),
}

impl SingleFlight {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Take the refresh right, or subscribe to the current flight.
    ///
    /// The lock is held only to inspect or fill the slot, never across an await.
    pub(crate) fn join_or_lead(&self) -> Flight<'_> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(rx) = slot.as_ref() {
            return Flight::Follower(FlightWaiter { rx: rx.clone() });
        }
        let (tx, rx) = watch::channel(false);
        *slot = Some(rx);
        Flight::Leader(FlightGuard { owner: self, tx })
    }

    /// Whether a refresh is currently in flight.
    pub(crate) fn in_flight(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Refresh right held by the leading caller.
///
/// Dropping the guard (normally or because the leading future was cancelled)
/// clears the slot and raises the completion signal exactly once.
pub(crate) struct FlightGuard<'a> {
    owner: &'a SingleFlight,
    tx: watch::Sender<bool>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        // Clear before signalling: a woken follower that re-enters must not
        // find the finished flight still registered.
        self.owner
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let _ = self.tx.send(true);
    }
}

/// Completion signal of someone else's flight.
pub(crate) struct FlightWaiter {
    rx: watch::Receiver<bool>,
}

impl FlightWaiter {
    /// Resolve once the flight completes.
    ///
    /// A dropped sender also counts as completion.
    pub(crate) async fn wait(mut self) {
        let _ = self.rx.wait_for(|done| *done).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn second_caller_follows() {
        let sf = SingleFlight::new();
        let lead = sf.join_or_lead();
        assert!(matches!(lead, Flight::Leader(_)));
        assert!(matches!(sf.join_or_lead(), Flight::Follower(_)));
        assert!(sf.in_flight());

        drop(lead);
        assert!(!sf.in_flight());
        assert!(matches!(sf.join_or_lead(), Flight::Leader(_)));
    }

    #[tokio::test]
    async fn followers_wake_when_leader_drops() {
        let sf = Arc::new(SingleFlight::new());
        let Flight::Leader(guard) = sf.join_or_lead() else {
            panic!("first caller must lead");
        };
        let Flight::Follower(waiter) = sf.join_or_lead() else {
            panic!("second caller must follow");
        };

        let handle = tokio::spawn(waiter.wait());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("follower must wake")
            .unwrap();
    }

    #[tokio::test]
    async fn waiter_subscribed_after_completion_returns_immediately() {
        let sf = SingleFlight::new();
        let Flight::Leader(guard) = sf.join_or_lead() else {
            panic!("first caller must lead");
        };
        let Flight::Follower(waiter) = sf.join_or_lead() else {
            panic!("second caller must follow");
        };
        drop(guard);

        tokio::time::timeout(Duration::from_millis(100), waiter.wait())
            .await
            .expect("completed flight must not block");
    }
}
