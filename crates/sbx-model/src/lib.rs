mod domain;
pub use domain::{
    BAGGAGE_PROPERTY, ENV_BASELINE_KIND, ENV_BASELINE_KIND_ALIAS, ENV_BASELINE_NAME,
    ENV_BASELINE_NAMESPACE, ENV_DELIVERY_MODE, ENV_FETCH_TIMEOUT_MS, ENV_POD_NAMESPACE,
    ENV_RECEIVE_BACKOFF_MS, ENV_REFRESH_INTERVAL_SECONDS, ENV_REFRESH_WAIT_TIMEOUT_MS,
    ENV_ROUTE_SERVER_ADDR, ENV_SANDBOX_NAME, ENV_SANDBOX_ROUTING_KEY, QUERY_BASELINE_KIND,
    QUERY_BASELINE_NAME, QUERY_BASELINE_NAMESPACE, QUERY_DESTINATION_SANDBOX,
    ROUTING_KEY_PROPERTY, ROUTING_RULES_PATH,
};
pub use domain::{DeliveryMode, InstanceRole, SandboxIdentity, WorkloadIdentity};

mod error;
pub use error::{ModelError, ModelResult};

mod rules;
pub use rules::{RoutingRule, RoutingRulesResponse};
