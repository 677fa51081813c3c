use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use sbx_core::{baggage::extract_routing_key, carrier::Carrier};

use crate::{
    convert::headers_from_map,
    error::ApiError,
    handler::{DecideResult, RoutingHandler},
};

/// HTTP status API builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
}

impl<H> HttpApi<H>
where
    H: RoutingHandler,
{
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    /// Build axum router with mounted endpoints.
    pub fn router(self) -> Router {
        Router::new()
            .route("/healthz", get(healthz))
            .route("/api/v1/routing", get(routing_status::<H>))
            .route("/api/v1/routing/refresh", post(refresh::<H>))
            .route("/api/v1/routing/decide", get(decide::<H>))
            .route("/metrics", get(metrics::<H>))
            .with_state(self.handler)
    }
}

/// Serve `router` on `listener` until `cancel` fires; in-flight requests are drained.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "status api listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecideQuery {
    routing_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
    outcome: &'static str,
}

// ============================================================================
// Handlers
// ============================================================================

async fn healthz() -> &'static str {
    "ok"
}

/// GET /api/v1/routing
async fn routing_status<H>(State(handler): State<Arc<H>>) -> impl IntoResponse
where
    H: RoutingHandler,
{
    Json(handler.status())
}

/// POST /api/v1/routing/refresh
async fn refresh<H>(State(handler): State<Arc<H>>) -> impl IntoResponse
where
    H: RoutingHandler,
{
    let outcome = handler.refresh().await;
    Json(RefreshResponse {
        outcome: outcome.as_str(),
    })
}

/// GET /api/v1/routing/decide
///
/// Query params:
/// - ?routingKey=key - decide for this key
/// - no params - read the key from the request's own baggage header
async fn decide<H>(
    State(handler): State<Arc<H>>,
    Query(query): Query<DecideQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError>
where
    H: RoutingHandler,
{
    let routing_key = match query.routing_key {
        Some(key) if key.trim().is_empty() => {
            return Err(ApiError::InvalidRequest(
                "routingKey cannot be empty".into(),
            ));
        }
        Some(key) => Some(key),
        None => {
            let headers = headers_from_map(&headers);
            extract_routing_key(&Carrier::from(&headers))
        }
    };

    let decision = handler.decide(routing_key.as_deref());
    Ok(Json(DecideResult::new(routing_key, decision)))
}

/// GET /metrics
async fn metrics<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: RoutingHandler,
{
    let body = handler.metrics()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
