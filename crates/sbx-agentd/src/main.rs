use std::{sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use tokio::{net::TcpListener, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use sbx_api::{HttpApi, RouterAdapter, serve};
use sbx_core::prelude::*;
use sbx_core::{
    metrics::MetricsHandle,
    source::memory::{MemoryQueue, MemoryQueueConfig},
};
use sbx_observe::{LoggerConfig, init_local_offset, init_logger};
use sbx_prometheus::PrometheusMetrics;

/// Bind address of the status API.
const ENV_STATUS_ADDR: &str = "SBX_STATUS_ADDR";
const DEFAULT_STATUS_ADDR: &str = "0.0.0.0:9090";

/// How long tasks get to stop after cancellation before they are aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

fn main() -> anyhow::Result<()> {
    // 1) local offset must be captured while the process is single-threaded
    init_local_offset();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;
    runtime.block_on(run())
}

async fn run() -> anyhow::Result<()> {
    // 2) logger
    let log_cfg = LoggerConfig::from_env()?;
    init_logger(&log_cfg)?;
    info!(format = %log_cfg.format, tz = %log_cfg.tz, "logger initialized");

    // 3) routing configuration
    let cfg = RouterConfig::from_env().context("load routing configuration")?;
    let role = cfg.role();
    info!(
        role = %role,
        workload = %cfg.workload,
        route_server = %cfg.route_server_addr,
        mode = %cfg.delivery_mode,
        "routing configured"
    );

    // 4) metrics + route cache
    let prometheus = PrometheusMetrics::new()?;
    let metrics: MetricsHandle = Arc::new(prometheus.clone());

    let cache = Arc::new(cfg.route_cache()?.with_metrics(metrics.clone()));
    let filter = RoutingFilter::new(role, cache.clone())
        .with_delivery_mode(cfg.delivery_mode)
        .with_metrics(metrics.clone());

    // 5) message source
    let queue = Arc::new(MemoryQueue::new(MemoryQueueConfig::default()));
    seed_demo_messages(&queue);

    let cancel = CancellationToken::new();
    let mut tasks = JoinSet::new();

    // 6) background refresh
    tasks.spawn(
        RefreshTask::new(cache.clone())
            .with_period(cfg.refresh_interval())
            .run(cancel.clone()),
    );

    // 7) consumer
    let consumer = Consumer::new(queue, Arc::new(LoggingHandler), filter.clone())
        .with_receive_backoff(cfg.receive_backoff())
        .with_metrics(metrics);
    let consumer_cancel = cancel.clone();
    tasks.spawn(async move {
        let stats = consumer.run(consumer_cancel).await;
        info!(?stats, "consumer stopped");
    });

    // 8) status api
    let addr = std::env::var(ENV_STATUS_ADDR)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_STATUS_ADDR.to_string());
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind status api on {addr}"))?;
    let router = HttpApi::new(Arc::new(RouterAdapter::new(filter).with_metrics(prometheus))).router();
    let api_cancel = cancel.clone();
    tasks.spawn(async move {
        if let Err(e) = serve(listener, router, api_cancel).await {
            error!(error = %e, "status api failed");
        }
    });

    shutdown_signal().await?;
    cancel.cancel();
    drain(tasks).await;
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate()).context("register SIGTERM")?;
        let mut sigint = signal(SignalKind::interrupt()).context("register SIGINT")?;
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigint.recv() => info!("received SIGINT"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.context("listen for ctrl-c")?;
        info!("received ctrl-c");
    }
    Ok(())
}

/// Wait for every task to finish, aborting the rest after the grace period.
async fn drain(mut tasks: JoinSet<()>) {
    let joined = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while let Some(res) = tasks.join_next().await {
            if let Err(e) = res {
                warn!(error = %e, "task ended abnormally");
            }
        }
    })
    .await;

    if joined.is_err() {
        warn!(
            grace_ms = SHUTDOWN_GRACE.as_millis() as u64,
            remaining = tasks.len(),
            "shutdown grace elapsed, aborting tasks"
        );
        tasks.shutdown().await;
    }
    info!("shutdown complete");
}

/// Handler that only logs what it receives.
struct LoggingHandler;

#[async_trait]
impl MessageHandler for LoggingHandler {
    async fn handle(&self, payload: &[u8], carrier: Carrier<'_>) -> anyhow::Result<()> {
        info!(
            bytes = payload.len(),
            routing_key = extract_routing_key(&carrier).as_deref().unwrap_or(""),
            "message handled"
        );
        Ok(())
    }
}

// demo traffic: untagged, sandbox-tagged over attributes, sandbox-tagged over headers
fn seed_demo_messages(queue: &MemoryQueue) {
    queue.send("untagged order", MessageAttributes::new());
    queue.send(
        "order for sandbox-42",
        MessageAttributes::new().with_routing_key("sandbox-42"),
    );
    queue.send(
        "order for sandbox-7",
        Headers::new().with_routing_key("sandbox-7"),
    );
}
