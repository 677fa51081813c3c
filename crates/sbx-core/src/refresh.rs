//! Background refresh of the route cache.
//!
//! Keeps the snapshot warm so that the per-message `ensure_fresh` on the hot
//! path rarely has to fetch.
use std::{sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::cache::{RefreshOutcome, RouteCache};

/// Periodic refresher bound to one route cache.
#[derive(Debug, Clone)]
pub struct RefreshTask {
    cache: Arc<RouteCache>,
    period: Duration,
}

impl RefreshTask {
    /// Refresh every `refresh_interval` of the cache settings.
    pub fn new(cache: Arc<RouteCache>) -> Self {
        let period = cache.settings().refresh_interval;
        Self { cache, period }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Refresh immediately, then once per period, until `cancel` fires.
    ///
    /// A tick is skipped only if a refresh landed within the last half period.
    pub async fn run(self, cancel: CancellationToken) {
        debug!(period_ms = self.period.as_millis() as u64, "route refresh started");

        let max_age = self.period / 2;
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = self.cache.ensure_fresh_with(max_age) => outcome,
            };
            match outcome {
                RefreshOutcome::Fresh => trace!("route snapshot still fresh"),
                other => trace!(outcome = %other, "route refresh tick"),
            }
        }
        debug!("route refresh stopped");
    }

    /// Run on the current tokio runtime.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use sbx_model::{RoutingRule, RoutingRulesResponse, WorkloadIdentity};

    use crate::cache::CacheSettings;
    use crate::rules::{RulesError, RulesQuery, RulesSource};

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RulesSource for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn fetch(&self, _: &RulesQuery) -> Result<RoutingRulesResponse, RulesError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok([RoutingRule::new(format!("key-{n}"))].into_iter().collect())
        }
    }

    fn cache(source: Arc<Counting>) -> Arc<RouteCache> {
        Arc::new(
            RouteCache::new(
                RulesQuery::for_workload(WorkloadIdentity::default()),
                source,
            )
            .with_settings(CacheSettings {
                refresh_interval: Duration::from_secs(5),
                ..Default::default()
            }),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_immediately_then_every_interval() {
        let source = Arc::new(Counting::default());
        let cache = cache(source.clone());
        let cancel = CancellationToken::new();
        let handle = RefreshTask::new(cache.clone()).spawn(cancel.clone());

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(cache.contains("key-0"));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_cancel() {
        let source = Arc::new(Counting::default());
        let cancel = CancellationToken::new();
        let handle = RefreshTask::new(cache(source.clone())).spawn(cancel.clone());

        tokio::time::sleep(Duration::from_millis(1)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("task must stop promptly")
            .unwrap();

        let before = source.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), before);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_start_never_fetches() {
        let source = Arc::new(Counting::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        RefreshTask::new(cache(source.clone())).run(cancel).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }
}
