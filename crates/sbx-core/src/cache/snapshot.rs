use std::{collections::HashSet, time::Duration};

use tokio::time::Instant;

/// Immutable view of the active routing keys at one point in time.
///
/// Replaced wholesale on every successful refresh, so readers never observe a
/// partial update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSnapshot {
    active_keys: HashSet<String>,
    updated_at: Option<Instant>,
    version: u64,
}

impl RouteSnapshot {
    /// Snapshot before the first successful refresh.
    pub fn empty() -> Self {
        Self {
            active_keys: HashSet::new(),
            updated_at: None,
            version: 0,
        }
    }

    pub(crate) fn new(active_keys: HashSet<String>, updated_at: Instant, version: u64) -> Self {
        Self {
            active_keys,
            updated_at: Some(updated_at),
            version,
        }
    }

    pub fn active_keys(&self) -> &HashSet<String> {
        &self.active_keys
    }

    /// Active keys in lexical order.
    pub fn sorted_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.active_keys.iter().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn contains(&self, key: &str) -> bool {
        self.active_keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.active_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active_keys.is_empty()
    }

    /// Number of successful refreshes applied so far.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Time of the last successful refresh.
    pub fn updated_at(&self) -> Option<Instant> {
        self.updated_at
    }

    pub fn has_completed_first_update(&self) -> bool {
        self.updated_at.is_some()
    }

    /// Time elapsed since the last successful refresh.
    pub fn age(&self, now: Instant) -> Option<Duration> {
        self.updated_at.map(|t| now.saturating_duration_since(t))
    }

    /// Stale when never updated, or strictly older than `max_age`.
    pub fn is_stale(&self, max_age: Duration, now: Instant) -> bool {
        match self.age(now) {
            None => true,
            Some(age) => age > max_age,
        }
    }
}

impl Default for RouteSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
