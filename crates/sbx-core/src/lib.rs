pub mod baggage;
pub mod cache;
pub mod carrier;
pub mod config;
pub mod consumer;
pub mod decision;
pub mod metrics;
pub mod refresh;
pub mod rules;
pub mod source;

pub mod prelude {
    pub use crate::baggage::{Baggage, extract_routing_key};
    pub use crate::cache::{CacheSettings, RefreshOutcome, RouteCache, RouteSnapshot};
    pub use crate::carrier::{AttributeValue, Carrier, Headers, MessageAttributes};
    pub use crate::config::{ConfigError, RouterConfig};
    pub use crate::consumer::{Consumer, ConsumerStats, DeliveryOutcome, MessageHandler};
    pub use crate::decision::{Decision, ReleaseAction, RoutingFilter, decide, should_process};
    pub use crate::metrics::{MetricsBackend, MetricsHandle, noop_metrics};
    pub use crate::refresh::RefreshTask;
    pub use crate::rules::{HttpRulesSource, RulesError, RulesQuery, RulesSource};
    pub use crate::source::{Delivery, MessageSource, Metadata, SourceError};
}
