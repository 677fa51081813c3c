//! Routing-rules source abstraction used by the route cache.
//!
//! The cache only depends on [`RulesSource`]; the route-server HTTP client is one
//! implementation, tests plug in scripted ones.
mod error;
pub use error::RulesError;

mod http;
pub use http::HttpRulesSource;
pub(crate) use http::parse_base;

use std::fmt;

use async_trait::async_trait;
use reqwest::Url;

use sbx_model::{
    QUERY_BASELINE_KIND, QUERY_BASELINE_NAME, QUERY_BASELINE_NAMESPACE, QUERY_DESTINATION_SANDBOX,
    ROUTING_RULES_PATH, RoutingRulesResponse, WorkloadIdentity,
};

/// Parameters of a routing-rules query.
///
/// Built once from the workload identity and, for sandbox-scoped queries, the
/// sandbox name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RulesQuery {
    pub workload: WorkloadIdentity,
    pub sandbox_name: Option<String>,
}

impl RulesQuery {
    /// Query for every rule of the workload.
    pub fn for_workload(workload: WorkloadIdentity) -> Self {
        Self {
            workload,
            sandbox_name: None,
        }
    }

    /// Restrict the query to rules targeting one sandbox.
    pub fn with_sandbox(mut self, name: impl Into<String>) -> Self {
        self.sandbox_name = Some(name.into());
        self
    }

    /// Build the full request URL against a route-server base address.
    ///
    /// Any path on `base` is replaced by the routing-rules path.
    pub fn to_url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        url.set_path(ROUTING_RULES_PATH);
        url.set_query(None);
        url.set_fragment(None);
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair(QUERY_BASELINE_KIND, &self.workload.kind)
                .append_pair(QUERY_BASELINE_NAMESPACE, &self.workload.namespace)
                .append_pair(QUERY_BASELINE_NAME, &self.workload.name);
            if let Some(sandbox) = &self.sandbox_name {
                pairs.append_pair(QUERY_DESTINATION_SANDBOX, sandbox);
            }
        }
        url
    }
}

impl fmt::Display for RulesQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sandbox_name {
            Some(sb) => write!(f, "{} (sandbox {sb})", self.workload),
            None => write!(f, "{}", self.workload),
        }
    }
}

/// Remote source of routing rules.
#[async_trait]
pub trait RulesSource: Send + Sync {
    /// Source name used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Fetch the current rules for `query`.
    ///
    /// Any error is a soft failure for the caller: the cache keeps its previous
    /// snapshot and retries later.
    async fn fetch(&self, query: &RulesQuery) -> Result<RoutingRulesResponse, RulesError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://localhost:8080").unwrap()
    }

    #[test]
    fn baseline_query_has_workload_params_only() {
        let q = RulesQuery::for_workload(WorkloadIdentity::default());
        assert_eq!(
            q.to_url(&base()).as_str(),
            "http://localhost:8080/api/v1/workloads/routing-rules?baselineKind=Deployment&baselineNamespace=default&baselineName=consumer"
        );
    }

    #[test]
    fn sandbox_query_adds_destination() {
        let q = RulesQuery::for_workload(WorkloadIdentity::new("Deployment", "orders", "proc"))
            .with_sandbox("feature-x");
        let url = q.to_url(&base());
        assert!(
            url.as_str().ends_with("&destinationSandboxName=feature-x"),
            "unexpected url: {url}"
        );
    }

    #[test]
    fn base_path_and_query_are_replaced_and_values_encoded() {
        let base = Url::parse("http://routeserver.signadot.svc:7778/ignored?x=1#frag").unwrap();
        let q = RulesQuery::for_workload(WorkloadIdentity::new("Deployment", "a b", "c&d"));
        assert_eq!(
            q.to_url(&base).as_str(),
            "http://routeserver.signadot.svc:7778/api/v1/workloads/routing-rules?baselineKind=Deployment&baselineNamespace=a+b&baselineName=c%26d"
        );
    }

    #[test]
    fn display_mentions_sandbox() {
        let q = RulesQuery::for_workload(WorkloadIdentity::default()).with_sandbox("sb");
        assert_eq!(q.to_string(), "Deployment/default/consumer (sandbox sb)");
    }
}
