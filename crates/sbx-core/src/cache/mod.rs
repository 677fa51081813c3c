//! Route cache: the instance's view of which routing keys are claimed by
//! active sandboxes.
//!
//! Readers load the current [`RouteSnapshot`] lock-free; refreshes are
//! coalesced so that concurrent stale callers trigger exactly one fetch.
mod flight;
use flight::{Flight, SingleFlight};

mod snapshot;
pub use snapshot::RouteSnapshot;

use std::{collections::HashSet, fmt, sync::Arc, time::Duration};

use arc_swap::ArcSwap;
use tokio::time::{Instant, timeout};
use tracing::{debug, error, info, warn};

use crate::{
    metrics::{MetricsHandle, RefreshStatus, noop_metrics},
    rules::{RulesError, RulesQuery, RulesSource},
};

/// Timing knobs of a [`RouteCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    /// Snapshot age after which the cache is considered stale.
    pub refresh_interval: Duration,
    /// Longest a caller waits for someone else's in-flight refresh.
    pub wait_timeout: Duration,
    /// Upper bound on a single fetch.
    pub fetch_timeout: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(5),
            wait_timeout: Duration::from_secs(10),
            fetch_timeout: Duration::from_secs(5),
        }
    }
}

/// Result of [`RouteCache::ensure_fresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshOutcome {
    /// Snapshot was fresh; no I/O happened.
    Fresh,
    /// This caller fetched and applied new rules.
    Refreshed,
    /// This caller fetched and failed; the previous snapshot is kept.
    Failed,
    /// Another caller's refresh completed while this one waited.
    Joined,
    /// Waiting on another caller's refresh took too long.
    WaitTimedOut,
}

impl RefreshOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshOutcome::Fresh => "fresh",
            RefreshOutcome::Refreshed => "refreshed",
            RefreshOutcome::Failed => "failed",
            RefreshOutcome::Joined => "joined",
            RefreshOutcome::WaitTimedOut => "wait-timed-out",
        }
    }
}

impl fmt::Display for RefreshOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared cache of active routing keys.
///
/// Constructed once per process and injected (`Arc<RouteCache>`) into the
/// routing filter, the refresh task and the status API.
pub struct RouteCache {
    query: RulesQuery,
    source: Arc<dyn RulesSource>,
    settings: CacheSettings,
    snapshot: ArcSwap<RouteSnapshot>,
    flight: SingleFlight,
    metrics: MetricsHandle,
}

impl RouteCache {
    /// Create an empty cache with default settings.
    pub fn new(query: RulesQuery, source: Arc<dyn RulesSource>) -> Self {
        Self {
            query,
            source,
            settings: CacheSettings::default(),
            snapshot: ArcSwap::from_pointee(RouteSnapshot::empty()),
            flight: SingleFlight::new(),
            metrics: noop_metrics(),
        }
    }

    pub fn with_settings(mut self, settings: CacheSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn query(&self) -> &RulesQuery {
        &self.query
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Name of the underlying rules source.
    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Current snapshot; never blocks on a concurrent refresh.
    pub fn snapshot(&self) -> Arc<RouteSnapshot> {
        self.snapshot.load_full()
    }

    /// Whether `key` is claimed by an active sandbox in the current snapshot.
    pub fn contains(&self, key: &str) -> bool {
        self.snapshot.load().contains(key)
    }

    /// Whether the snapshot is older than the refresh interval (or missing).
    pub fn is_stale(&self) -> bool {
        self.is_stale_for(self.settings.refresh_interval)
    }

    /// Whether a refresh is currently running.
    pub fn is_refreshing(&self) -> bool {
        self.flight.in_flight()
    }

    fn is_stale_for(&self, max_age: Duration) -> bool {
        self.snapshot.load().is_stale(max_age, Instant::now())
    }

    /// Make sure the snapshot is no older than the refresh interval.
    pub async fn ensure_fresh(&self) -> RefreshOutcome {
        self.ensure_fresh_with(self.settings.refresh_interval).await
    }

    /// Make sure the snapshot is no older than `max_age`.
    ///
    /// Never fails: fetch errors are logged and reported as
    /// [`RefreshOutcome::Failed`], leaving the previous snapshot in place.
    pub async fn ensure_fresh_with(&self, max_age: Duration) -> RefreshOutcome {
        if !self.is_stale_for(max_age) {
            return RefreshOutcome::Fresh;
        }

        match self.flight.join_or_lead() {
            Flight::Follower(waiter) => {
                match timeout(self.settings.wait_timeout, waiter.wait()).await {
                    Ok(()) => RefreshOutcome::Joined,
                    Err(_) => {
                        warn!(
                            query = %self.query,
                            wait_timeout_ms = self.settings.wait_timeout.as_millis() as u64,
                            "gave up waiting for in-flight routing rules refresh"
                        );
                        RefreshOutcome::WaitTimedOut
                    }
                }
            }
            Flight::Leader(_guard) => {
                // A flight that finished between the check above and taking the
                // slot may already have satisfied us.
                if !self.is_stale_for(max_age) {
                    return RefreshOutcome::Fresh;
                }
                self.refresh().await
            }
        }
    }

    async fn refresh(&self) -> RefreshOutcome {
        let started = Instant::now();
        let result = match timeout(self.settings.fetch_timeout, self.source.fetch(&self.query))
            .await
        {
            Ok(res) => res,
            Err(_) => Err(RulesError::Timeout(self.settings.fetch_timeout)),
        };
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(resp) => {
                self.metrics
                    .record_refresh(RefreshStatus::Success, elapsed_ms);
                self.apply(resp.into_active_keys());
                RefreshOutcome::Refreshed
            }
            Err(e) => {
                let status = match e {
                    RulesError::Timeout(_) => RefreshStatus::Timeout,
                    _ => RefreshStatus::Failure,
                };
                self.metrics.record_refresh(status, elapsed_ms);
                error!(
                    source = self.source.name(),
                    query = %self.query,
                    elapsed_ms,
                    error = %e,
                    "failed to refresh routing rules"
                );
                RefreshOutcome::Failed
            }
        }
    }

    fn apply(&self, active_keys: HashSet<String>) {
        let prev = self.snapshot.load();
        let next = RouteSnapshot::new(active_keys, Instant::now(), prev.version() + 1);

        if prev.active_keys() != next.active_keys() {
            info!(
                query = %self.query,
                version = next.version(),
                active_keys = next.len(),
                "routing rules changed"
            );
        } else {
            debug!(version = next.version(), "routing rules unchanged");
        }
        self.metrics.record_active_keys(next.len());
        self.snapshot.store(Arc::new(next));
    }
}

impl fmt::Debug for RouteCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteCache")
            .field("query", &self.query)
            .field("source", &self.source.name())
            .field("settings", &self.settings)
            .field("snapshot", &self.snapshot.load_full())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use sbx_model::{RoutingRule, RoutingRulesResponse, WorkloadIdentity};

    /// Rules source replaying scripted replies; an exhausted script yields no rules.
    #[derive(Default)]
    struct Scripted {
        calls: AtomicUsize,
        delay: Duration,
        replies: Mutex<VecDeque<Result<Vec<&'static str>, u16>>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<Vec<&'static str>, u16>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Default::default()
            }
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RulesSource for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn fetch(&self, _: &RulesQuery) -> Result<RoutingRulesResponse, RulesError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Ok(vec![]));
            match reply {
                Ok(keys) => Ok(keys.into_iter().map(RoutingRule::new).collect()),
                Err(status) => Err(RulesError::Status {
                    status,
                    body: String::new(),
                }),
            }
        }
    }

    fn cache(source: Arc<Scripted>) -> RouteCache {
        RouteCache::new(
            RulesQuery::for_workload(WorkloadIdentity::default()),
            source,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_calls_within_interval_fetch_once() {
        let source = Arc::new(Scripted::new(vec![Ok(vec!["a"])]));
        let cache = cache(source.clone());

        assert!(cache.is_stale());
        assert_eq!(cache.ensure_fresh().await, RefreshOutcome::Refreshed);
        for _ in 0..5 {
            assert_eq!(cache.ensure_fresh().await, RefreshOutcome::Fresh);
        }
        assert_eq!(source.calls(), 1);
        assert!(cache.contains("a"));
        assert_eq!(cache.snapshot().version(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn staleness_uses_strict_comparison() {
        let source = Arc::new(Scripted::new(vec![Ok(vec!["a"]), Ok(vec!["b"])]));
        let cache = cache(source.clone());
        cache.ensure_fresh().await;

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.ensure_fresh().await, RefreshOutcome::Fresh);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.ensure_fresh().await, RefreshOutcome::Refreshed);
        assert_eq!(source.calls(), 2);
        assert!(cache.contains("b"));
        assert!(!cache.contains("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_previous_snapshot() {
        let source = Arc::new(Scripted::new(vec![Ok(vec!["a"]), Err(503)]));
        let cache = cache(source.clone());
        cache.ensure_fresh().await;

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.ensure_fresh().await, RefreshOutcome::Failed);

        let snap = cache.snapshot();
        assert!(snap.contains("a"));
        assert_eq!(snap.version(), 1);
        assert!(cache.is_stale());

        // The next call retries.
        assert_eq!(cache.ensure_fresh().await, RefreshOutcome::Refreshed);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_before_first_success_leaves_empty_set() {
        let source = Arc::new(Scripted::new(vec![Err(500)]));
        let cache = cache(source);

        assert_eq!(cache.ensure_fresh().await, RefreshOutcome::Failed);
        let snap = cache.snapshot();
        assert!(!snap.has_completed_first_update());
        assert!(snap.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_is_bounded() {
        let source = Arc::new(Scripted::new(vec![Ok(vec!["a"])]).delayed(Duration::from_secs(30)));
        let cache = cache(source.clone()).with_settings(CacheSettings {
            fetch_timeout: Duration::from_secs(1),
            ..Default::default()
        });

        assert_eq!(cache.ensure_fresh().await, RefreshOutcome::Failed);
        assert!(!cache.contains("a"));
        assert!(!cache.is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_stale_callers_share_one_fetch() {
        let source =
            Arc::new(Scripted::new(vec![Ok(vec!["a"])]).delayed(Duration::from_millis(50)));
        let cache = Arc::new(cache(source.clone()));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.ensure_fresh().await })
            })
            .collect();

        let mut outcomes = Vec::new();
        for h in handles {
            outcomes.push(h.await.unwrap());
        }

        assert_eq!(source.calls(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| **o == RefreshOutcome::Refreshed)
                .count(),
            1
        );
        assert!(
            outcomes
                .iter()
                .all(|o| matches!(o, RefreshOutcome::Refreshed | RefreshOutcome::Joined))
        );
        assert!(cache.contains("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn follower_wait_is_bounded() {
        let source =
            Arc::new(Scripted::new(vec![Ok(vec!["a"])]).delayed(Duration::from_secs(60)));
        let cache = Arc::new(cache(source.clone()).with_settings(CacheSettings {
            refresh_interval: Duration::from_secs(5),
            wait_timeout: Duration::from_secs(1),
            fetch_timeout: Duration::from_secs(120),
        }));

        let leader = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.ensure_fresh().await })
        };
        tokio::task::yield_now().await;
        assert!(cache.is_refreshing());

        assert_eq!(cache.ensure_fresh().await, RefreshOutcome::WaitTimedOut);
        assert_eq!(source.calls(), 1);

        assert_eq!(leader.await.unwrap(), RefreshOutcome::Refreshed);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_leader_releases_the_flight() {
        let source = Arc::new(
            Scripted::new(vec![Ok(vec!["a"]), Ok(vec!["b"])]).delayed(Duration::from_secs(1)),
        );
        let cache = Arc::new(cache(source.clone()));

        let leader = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.ensure_fresh().await })
        };
        tokio::task::yield_now().await;
        assert!(cache.is_refreshing());

        leader.abort();
        assert!(leader.await.unwrap_err().is_cancelled());
        assert!(!cache.is_refreshing());

        assert_eq!(cache.ensure_fresh().await, RefreshOutcome::Refreshed);
        assert_eq!(source.calls(), 2);
    }
}
