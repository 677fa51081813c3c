//! Operator-facing HTTP status API for a routing consumer.
//!
//! Mount [`HttpApi::router`] next to the consumer and serve it with [`serve`]:
//!
//! - `GET  /healthz`
//! - `GET  /api/v1/routing`
//! - `POST /api/v1/routing/refresh`
//! - `GET  /api/v1/routing/decide?routingKey=<key>`
//! - `GET  /metrics`
mod adapter;
pub use adapter::RouterAdapter;

mod convert;
pub use convert::headers_from_map;

mod error;
pub use error::ApiError;

mod handler;
pub use handler::{DecideResult, RoutingHandler, RoutingStatus};

mod http;
pub use http::{HttpApi, serve};
