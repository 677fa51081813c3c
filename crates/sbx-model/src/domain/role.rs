use std::fmt;

use crate::domain::SandboxIdentity;

/// Role of this consumer instance in the routing protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceRole {
    /// Always-on production consumer; handles everything not claimed by a live sandbox.
    Baseline,
    /// Short-lived consumer under test; handles only traffic tagged with its key.
    Sandbox(SandboxIdentity),
}

impl InstanceRole {
    /// Bounded label used in logs and metrics.
    #[inline]
    pub fn label(&self) -> &'static str {
        match self {
            InstanceRole::Baseline => "baseline",
            InstanceRole::Sandbox(_) => "sandbox",
        }
    }

    /// Returns `true` for the baseline role.
    #[inline]
    pub fn is_baseline(&self) -> bool {
        matches!(self, InstanceRole::Baseline)
    }

    /// Sandbox identity, if this instance is a sandbox.
    pub fn sandbox(&self) -> Option<&SandboxIdentity> {
        match self {
            InstanceRole::Baseline => None,
            InstanceRole::Sandbox(sb) => Some(sb),
        }
    }

    /// Routing key owned by this instance, if any.
    pub fn own_key(&self) -> Option<&str> {
        self.sandbox().map(|sb| sb.routing_key.as_str())
    }
}

impl From<Option<SandboxIdentity>> for InstanceRole {
    fn from(sandbox: Option<SandboxIdentity>) -> Self {
        match sandbox {
            Some(sb) => InstanceRole::Sandbox(sb),
            None => InstanceRole::Baseline,
        }
    }
}

impl fmt::Display for InstanceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceRole::Baseline => f.write_str("baseline"),
            InstanceRole::Sandbox(sb) => write!(f, "sandbox:{}", sb.name),
        }
    }
}
