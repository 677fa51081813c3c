#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use sbx_core::prelude::*;
use sbx_model::{RoutingRule, RoutingRulesResponse, WorkloadIdentity};

/// Rules source whose active keys can be changed between fetches.
#[derive(Default)]
pub struct SwitchableRules {
    keys: Mutex<Vec<String>>,
    failing: Mutex<Option<u16>>,
    calls: AtomicUsize,
}

impl SwitchableRules {
    pub fn set_keys(&self, keys: &[&str]) {
        *self.keys.lock().unwrap() = keys.iter().map(|k| k.to_string()).collect();
    }

    /// Make every following fetch fail with `status`, or succeed again with `None`.
    pub fn fail_with(&self, status: Option<u16>) {
        *self.failing.lock().unwrap() = status;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RulesSource for SwitchableRules {
    fn name(&self) -> &'static str {
        "switchable"
    }

    async fn fetch(&self, _: &RulesQuery) -> Result<RoutingRulesResponse, RulesError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = *self.failing.lock().unwrap() {
            return Err(RulesError::Status {
                status,
                body: "unavailable".into(),
            });
        }
        let keys = self.keys.lock().unwrap().clone();
        Ok(keys.into_iter().map(RoutingRule::new).collect())
    }
}

pub fn cache_over(source: Arc<SwitchableRules>) -> Arc<RouteCache> {
    Arc::new(RouteCache::new(
        RulesQuery::for_workload(WorkloadIdentity::new("Deployment", "orders", "processor")),
        source,
    ))
}

/// Handler recording payloads, failing the first `fail_first` calls.
#[derive(Default)]
pub struct RecordingHandler {
    pub seen: Mutex<Vec<String>>,
    pub fail_first: usize,
    calls: AtomicUsize,
}

impl RecordingHandler {
    pub fn failing_first(n: usize) -> Self {
        Self {
            fail_first: n,
            ..Default::default()
        }
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle(&self, payload: &[u8], _: Carrier<'_>) -> anyhow::Result<()> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(payload).into_owned());
        if n < self.fail_first {
            anyhow::bail!("transient handler failure #{n}");
        }
        Ok(())
    }
}
