//! Routing configuration, loaded from the environment at startup.
use std::{str::FromStr, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sbx_model::{
    DeliveryMode, ENV_BASELINE_KIND, ENV_BASELINE_KIND_ALIAS, ENV_BASELINE_NAME,
    ENV_BASELINE_NAMESPACE, ENV_DELIVERY_MODE, ENV_FETCH_TIMEOUT_MS, ENV_POD_NAMESPACE,
    ENV_RECEIVE_BACKOFF_MS, ENV_REFRESH_INTERVAL_SECONDS, ENV_REFRESH_WAIT_TIMEOUT_MS,
    ENV_ROUTE_SERVER_ADDR, ENV_SANDBOX_NAME, ENV_SANDBOX_ROUTING_KEY, InstanceRole, ModelError,
    SandboxIdentity, WorkloadIdentity,
};

use crate::{
    cache::{CacheSettings, RouteCache},
    rules::{HttpRulesSource, RulesQuery, parse_base},
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("sandbox name '{0}' is set but SIGNADOT_SANDBOX_ROUTING_KEY is missing")]
    SandboxWithoutKey(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("invalid route server address: {0}")]
    Address(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Routing configuration of one consumer instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouterConfig {
    /// Base address of the route server.
    pub route_server_addr: String,
    /// Baseline workload this instance belongs to.
    pub workload: WorkloadIdentity,
    /// Present when this instance is a sandbox.
    pub sandbox: Option<SandboxIdentity>,
    pub refresh_interval_secs: u64,
    pub refresh_wait_timeout_ms: u64,
    pub fetch_timeout_ms: u64,
    pub delivery_mode: DeliveryMode,
    /// Pause after a failed receive.
    pub receive_backoff_ms: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            route_server_addr: "http://localhost:8080".to_string(),
            workload: WorkloadIdentity::default(),
            sandbox: None,
            refresh_interval_secs: 5,
            refresh_wait_timeout_ms: 10_000,
            fetch_timeout_ms: 5_000,
            delivery_mode: DeliveryMode::default(),
            receive_backoff_ms: 1_000,
        }
    }
}

impl RouterConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup.
    ///
    /// Blank values count as unset. Unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut cfg = Self::default();

        if let Some(addr) = get(ENV_ROUTE_SERVER_ADDR) {
            cfg.route_server_addr = addr;
        }
        if let Some(kind) = get(ENV_BASELINE_KIND).or_else(|| get(ENV_BASELINE_KIND_ALIAS)) {
            cfg.workload.kind = kind;
        }
        if let Some(ns) = get(ENV_BASELINE_NAMESPACE).or_else(|| get(ENV_POD_NAMESPACE)) {
            cfg.workload.namespace = ns;
        }
        if let Some(name) = get(ENV_BASELINE_NAME) {
            cfg.workload.name = name;
        }

        cfg.sandbox = match (get(ENV_SANDBOX_NAME), get(ENV_SANDBOX_ROUTING_KEY)) {
            (name, Some(key)) => Some(SandboxIdentity::new(
                name.unwrap_or_else(|| key.clone()),
                key,
            )),
            (Some(name), None) => return Err(ConfigError::SandboxWithoutKey(name)),
            (None, None) => None,
        };

        if let Some(v) = get(ENV_REFRESH_INTERVAL_SECONDS) {
            cfg.refresh_interval_secs = parse(ENV_REFRESH_INTERVAL_SECONDS, &v)?;
        }
        if let Some(v) = get(ENV_REFRESH_WAIT_TIMEOUT_MS) {
            cfg.refresh_wait_timeout_ms = parse(ENV_REFRESH_WAIT_TIMEOUT_MS, &v)?;
        }
        if let Some(v) = get(ENV_FETCH_TIMEOUT_MS) {
            cfg.fetch_timeout_ms = parse(ENV_FETCH_TIMEOUT_MS, &v)?;
        }
        if let Some(v) = get(ENV_DELIVERY_MODE) {
            cfg.delivery_mode = parse(ENV_DELIVERY_MODE, &v)?;
        }
        if let Some(v) = get(ENV_RECEIVE_BACKOFF_MS) {
            cfg.receive_backoff_ms = parse(ENV_RECEIVE_BACKOFF_MS, &v)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("refreshIntervalSecs", self.refresh_interval_secs),
            ("refreshWaitTimeoutMs", self.refresh_wait_timeout_ms),
            ("fetchTimeoutMs", self.fetch_timeout_ms),
            ("receiveBackoffMs", self.receive_backoff_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(field));
            }
        }
        self.workload.validate()?;
        if let Some(sandbox) = &self.sandbox {
            sandbox.validate()?;
        }
        parse_base(&self.route_server_addr).map_err(|e| ConfigError::Address(e.to_string()))?;
        Ok(())
    }

    pub fn role(&self) -> InstanceRole {
        InstanceRole::from(self.sandbox.clone())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn receive_backoff(&self) -> Duration {
        Duration::from_millis(self.receive_backoff_ms)
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            refresh_interval: self.refresh_interval(),
            wait_timeout: Duration::from_millis(self.refresh_wait_timeout_ms),
            fetch_timeout: Duration::from_millis(self.fetch_timeout_ms),
        }
    }

    /// Rules query for this instance; sandbox instances scope it to themselves.
    pub fn rules_query(&self) -> RulesQuery {
        let query = RulesQuery::for_workload(self.workload.clone());
        match &self.sandbox {
            Some(sb) => query.with_sandbox(sb.name.clone()),
            None => query,
        }
    }

    /// Build a route cache backed by the route server.
    pub fn route_cache(&self) -> Result<RouteCache, ConfigError> {
        let source = HttpRulesSource::new(
            &self.route_server_addr,
            Duration::from_millis(self.fetch_timeout_ms),
        )
        .map_err(|e| ConfigError::Address(e.to_string()))?;

        Ok(RouteCache::new(self.rules_query(), Arc::new(source))
            .with_settings(self.cache_settings()))
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
