use std::{
    sync::{
        Arc,
        atomic::{AtomicU16, AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{Router, extract::State, http::StatusCode, routing::get};
use sbx_core::prelude::*;
use sbx_model::{InstanceRole, WorkloadIdentity};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct RouteServer {
    status: Arc<AtomicU16>,
    hits: Arc<AtomicUsize>,
}

impl RouteServer {
    fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn routing_rules(State(s): State<RouteServer>) -> (StatusCode, &'static str) {
    s.hits.fetch_add(1, Ordering::SeqCst);
    match s.status.load(Ordering::SeqCst) {
        200 => (
            StatusCode::OK,
            r#"{"routingRules":[{"routingKey":"sandbox-42"}]}"#,
        ),
        code => (
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            "route server unavailable",
        ),
    }
}

async fn start(initial_status: u16) -> (String, RouteServer) {
    let server = RouteServer::default();
    server.set_status(initial_status);

    let app = Router::new()
        .route("/api/v1/workloads/routing-rules", get(routing_rules))
        .with_state(server.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), server)
}

fn cache_for(base: &str, refresh_interval: Duration) -> Arc<RouteCache> {
    let source = HttpRulesSource::new(base, Duration::from_secs(2)).unwrap();
    Arc::new(
        RouteCache::new(
            RulesQuery::for_workload(WorkloadIdentity::new("Deployment", "orders", "processor")),
            Arc::new(source),
        )
        .with_settings(CacheSettings {
            refresh_interval,
            ..Default::default()
        }),
    )
}

#[tokio::test]
async fn unavailable_route_server_keeps_last_known_good() {
    let (base, server) = start(200).await;
    let cache = cache_for(&base, Duration::from_millis(50));
    let filter = RoutingFilter::new(InstanceRole::Baseline, cache.clone());

    assert_eq!(
        filter.decide(Some("sandbox-42")).await,
        Decision::Skip(ReleaseAction::MakeVisible)
    );
    assert_eq!(cache.snapshot().version(), 1);

    server.set_status(503);
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert_eq!(cache.ensure_fresh().await, RefreshOutcome::Failed);
    assert_eq!(server.hits(), 2);

    // Decisions keep using the last successful snapshot.
    assert_eq!(
        filter.decide(Some("sandbox-42")).await,
        Decision::Skip(ReleaseAction::MakeVisible)
    );
    assert!(cache.contains("sandbox-42"));
    assert_eq!(cache.snapshot().version(), 1);
    assert!(cache.is_stale());

    server.set_status(200);
    assert_eq!(cache.ensure_fresh().await, RefreshOutcome::Refreshed);
    assert_eq!(cache.snapshot().version(), 2);
}

#[tokio::test]
async fn unavailable_before_first_success_accepts_everything() {
    let (base, server) = start(503).await;
    let cache = cache_for(&base, Duration::from_millis(50));
    let filter = RoutingFilter::new(InstanceRole::Baseline, cache.clone());

    assert_eq!(filter.decide(Some("sandbox-42")).await, Decision::Accept);
    assert_eq!(filter.decide(None).await, Decision::Accept);
    assert!(server.hits() >= 1);
    assert!(!cache.snapshot().has_completed_first_update());
}

#[tokio::test]
async fn concurrent_decisions_share_one_request() {
    let (base, server) = start(200).await;
    let cache = cache_for(&base, Duration::from_secs(30));
    let filter = RoutingFilter::new(InstanceRole::Baseline, cache.clone());

    let decisions: Vec<_> = (0..8)
        .map(|i| {
            let filter = filter.clone();
            tokio::spawn(async move {
                let key = if i % 2 == 0 { "sandbox-42" } else { "sandbox-7" };
                filter.decide(Some(key)).await
            })
        })
        .collect();

    let mut accepted = 0;
    for d in decisions {
        if d.await.unwrap().is_accept() {
            accepted += 1;
        }
    }

    assert_eq!(server.hits(), 1);
    assert_eq!(accepted, 4);
}
