use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Single routing rule returned by the route server.
///
/// One rule exists per currently-active sandbox of the workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingRule {
    /// Routing key claimed by the sandbox; `null` carries no claim.
    ///
    /// Numbers and booleans are taken in their JSON text form. Arrays and
    /// objects carry no claim.
    #[serde(default, deserialize_with = "lenient_key")]
    pub routing_key: Option<String>,
}

impl RoutingRule {
    /// Create a rule claiming the given key.
    pub fn new(routing_key: impl Into<String>) -> Self {
        Self {
            routing_key: Some(routing_key.into()),
        }
    }
}

fn lenient_key<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(de)? {
        Some(Value::String(s)) => Some(s),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => Some(v.to_string()),
        _ => None,
    })
}

/// Body of a successful routing-rules query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingRulesResponse {
    pub routing_rules: Vec<RoutingRule>,
}

impl RoutingRulesResponse {
    /// Collapse the rules into the set of claimed routing keys.
    ///
    /// Rules without a key (or with an empty one) are ignored.
    pub fn into_active_keys(self) -> HashSet<String> {
        self.routing_rules
            .into_iter()
            .filter_map(|r| r.routing_key)
            .filter(|k| !k.is_empty())
            .collect()
    }
}

impl FromIterator<RoutingRule> for RoutingRulesResponse {
    fn from_iter<T: IntoIterator<Item = RoutingRule>>(iter: T) -> Self {
        Self {
            routing_rules: iter.into_iter().collect(),
        }
    }
}
