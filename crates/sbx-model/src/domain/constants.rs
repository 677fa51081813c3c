//! Well-known names shared by the routing layer.
//!
//! Keeping them here avoids scattering magic strings across carriers, the
//! routing-rules client and configuration loading.

/// Carrier property holding the W3C baggage list.
pub const BAGGAGE_PROPERTY: &str = "baggage";

/// Baggage member naming the sandbox a message belongs to.
pub const ROUTING_KEY_PROPERTY: &str = "sd-routing-key";

/// Path of the routing-rules endpoint on the route server.
pub const ROUTING_RULES_PATH: &str = "/api/v1/workloads/routing-rules";

pub const QUERY_BASELINE_KIND: &str = "baselineKind";
pub const QUERY_BASELINE_NAMESPACE: &str = "baselineNamespace";
pub const QUERY_BASELINE_NAME: &str = "baselineName";
pub const QUERY_DESTINATION_SANDBOX: &str = "destinationSandboxName";

pub const ENV_ROUTE_SERVER_ADDR: &str = "ROUTES_API_ROUTE_SERVER_ADDR";
pub const ENV_BASELINE_KIND: &str = "ROUTES_API_BASELINE_KIND";
pub const ENV_BASELINE_KIND_ALIAS: &str = "BASELINE_KIND";
pub const ENV_BASELINE_NAMESPACE: &str = "BASELINE_NAMESPACE";
pub const ENV_POD_NAMESPACE: &str = "POD_NAMESPACE";
pub const ENV_BASELINE_NAME: &str = "BASELINE_NAME";
pub const ENV_SANDBOX_NAME: &str = "SIGNADOT_SANDBOX_NAME";
pub const ENV_SANDBOX_ROUTING_KEY: &str = "SIGNADOT_SANDBOX_ROUTING_KEY";
pub const ENV_REFRESH_INTERVAL_SECONDS: &str = "ROUTES_API_REFRESH_INTERVAL_SECONDS";
pub const ENV_REFRESH_WAIT_TIMEOUT_MS: &str = "ROUTES_API_REFRESH_WAIT_TIMEOUT_MS";
pub const ENV_FETCH_TIMEOUT_MS: &str = "ROUTES_API_FETCH_TIMEOUT_MS";
pub const ENV_DELIVERY_MODE: &str = "ROUTES_DELIVERY_MODE";
pub const ENV_RECEIVE_BACKOFF_MS: &str = "ROUTES_RECEIVE_BACKOFF_MS";
