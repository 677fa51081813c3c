use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Logical service whose sandboxes are being routed.
///
/// Set once at startup from configuration and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkloadIdentity {
    /// Workload kind of the baseline (e.g. `Deployment`).
    pub kind: String,
    /// Namespace the baseline runs in.
    pub namespace: String,
    /// Name of the baseline workload.
    pub name: String,
}

impl WorkloadIdentity {
    /// Create a new workload identity.
    pub fn new<K, N, M>(kind: K, namespace: N, name: M) -> Self
    where
        K: Into<String>,
        N: Into<String>,
        M: Into<String>,
    {
        Self {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Rejects identities with blank fields.
    pub fn validate(&self) -> ModelResult<()> {
        for (field, value) in [
            ("kind", &self.kind),
            ("namespace", &self.namespace),
            ("name", &self.name),
        ] {
            if value.trim().is_empty() {
                return Err(ModelError::InvalidWorkload(format!("{field} is empty")));
            }
        }
        Ok(())
    }
}

impl Default for WorkloadIdentity {
    fn default() -> Self {
        Self::new("Deployment", "default", "consumer")
    }
}

impl fmt::Display for WorkloadIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

/// Identity held by an instance that is itself a sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxIdentity {
    /// Sandbox name, used to scope routing-rules queries.
    pub name: String,
    /// Routing key claimed by this sandbox.
    pub routing_key: String,
}

impl SandboxIdentity {
    /// Create a new sandbox identity.
    pub fn new<N, K>(name: N, routing_key: K) -> Self
    where
        N: Into<String>,
        K: Into<String>,
    {
        Self {
            name: name.into(),
            routing_key: routing_key.into(),
        }
    }

    /// Rejects identities with a blank name or routing key.
    pub fn validate(&self) -> ModelResult<()> {
        if self.name.trim().is_empty() {
            return Err(ModelError::InvalidSandbox("name is empty".into()));
        }
        if self.routing_key.trim().is_empty() {
            return Err(ModelError::InvalidSandbox("routing key is empty".into()));
        }
        Ok(())
    }
}
