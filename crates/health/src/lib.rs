//! Per-provider circuit breaker: Closed / Open / HalfOpen state machine with
//! exponential-backoff cooldown, backed by [`ig_kvstore::KVStore`].
//!
//! The hot path (`allow_request`, `mark_success`, `mark_failure`) holds a
//! short-lived per-provider mutex over a small in-process struct; the only
//! I/O is a single KVStore round-trip to check (or set) the penalty key,
//! never performed while the mutex is held.

use std::{
    collections::VecDeque,
    sync::Arc,
    time::Duration,
};

use dashmap::DashMap;
use ig_common::EventSink;
use ig_kvstore::KVStore;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BackoffConfig {
    pub base_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: 1_000,
            max_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HealthConfig {
    pub failure_rate_threshold: f64,
    pub minimum_requests: usize,
    pub half_open_success_threshold: u32,
    pub backoff: BackoffConfig,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            minimum_requests: 10,
            half_open_success_threshold: 3,
            backoff: BackoffConfig::default(),
        }
    }
}

struct LocalState {
    state: HealthState,
    outcomes: VecDeque<bool>,
    successes_in_half_open: u32,
    current_cooldown_ms: u64,
}

impl LocalState {
    fn new() -> Self {
        Self {
            state: HealthState::Closed,
            outcomes: VecDeque::new(),
            successes_in_half_open: 0,
            current_cooldown_ms: 0,
        }
    }
}

fn penalty_key(provider_key: &str) -> String {
    format!("health:{provider_key}:penalty")
}

/// Per-provider failure memory with cooldown and half-open recovery.
pub struct HealthStore {
    kv: Arc<dyn KVStore>,
    config: HealthConfig,
    local: DashMap<String, Mutex<LocalState>>,
    event_sink: Arc<dyn EventSink>,
}

impl HealthStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KVStore>, config: HealthConfig, event_sink: Arc<dyn EventSink>) -> Self {
        Self {
            kv,
            config,
            local: DashMap::new(),
            event_sink,
        }
    }

    /// Whether a request to `provider_key` may proceed right now. Fails open
    /// (returns `true` and logs a warning) if the KVStore is unreachable —
    /// a health-store outage must never cascade into a routing outage.
    pub async fn allow_request(&self, provider_key: &str) -> bool {
        match self.kv.exists(&penalty_key(provider_key)).await {
            Err(e) => {
                tracing::warn!(provider_key, error = %e, "health store KVStore read failed, failing open");
                true
            },
            Ok(true) => false,
            Ok(false) => {
                let entry = self
                    .local
                    .entry(provider_key.to_string())
                    .or_insert_with(|| Mutex::new(LocalState::new()));
                let mut state = entry.lock().await;
                if state.state == HealthState::Open {
                    state.state = HealthState::HalfOpen;
                    state.successes_in_half_open = 0;
                    tracing::info!(provider_key, "circuit breaker cooldown elapsed, probing half-open");
                }
                true
            },
        }
    }

    pub async fn mark_success(&self, provider_key: &str) {
        let entry = self
            .local
            .entry(provider_key.to_string())
            .or_insert_with(|| Mutex::new(LocalState::new()));
        let mut state = entry.lock().await;
        let mut closed_now = false;
        match state.state {
            HealthState::Closed => {
                push_outcome(&mut state.outcomes, true, self.config.minimum_requests);
            },
            HealthState::HalfOpen => {
                state.successes_in_half_open += 1;
                if state.successes_in_half_open >= self.config.half_open_success_threshold {
                    state.state = HealthState::Closed;
                    state.outcomes.clear();
                    state.current_cooldown_ms = 0;
                    closed_now = true;
                    tracing::info!(provider_key, "circuit breaker closed after half-open recovery");
                }
            },
            HealthState::Open => {},
        }
        drop(state);

        if closed_now {
            self.event_sink.provider_status_changed(provider_key, true).await;
        }
    }

    pub async fn mark_failure(&self, provider_key: &str) {
        let entry = self
            .local
            .entry(provider_key.to_string())
            .or_insert_with(|| Mutex::new(LocalState::new()));
        let mut state = entry.lock().await;
        let should_open = match state.state {
            HealthState::Closed => {
                push_outcome(&mut state.outcomes, false, self.config.minimum_requests);
                let total = state.outcomes.len();
                let failures = state.outcomes.iter().filter(|ok| !**ok).count();
                total >= self.config.minimum_requests
                    && (failures as f64 / total as f64) >= self.config.failure_rate_threshold
            },
            HealthState::HalfOpen => true,
            HealthState::Open => false,
        };

        if should_open {
            let next_cooldown = if state.current_cooldown_ms == 0 {
                self.config.backoff.base_ms
            } else {
                ((state.current_cooldown_ms as f64) * self.config.backoff.multiplier)
                    .min(self.config.backoff.max_ms as f64) as u64
            };
            state.state = HealthState::Open;
            state.current_cooldown_ms = next_cooldown;
            state.outcomes.clear();
            let jittered = jitter(next_cooldown);
            drop(state);

            if let Err(e) = self
                .kv
                .set(&penalty_key(provider_key), "1", Some(Duration::from_millis(jittered)))
                .await
            {
                tracing::warn!(provider_key, error = %e, "failed to persist breaker penalty, relying on local state");
            }
            tracing::warn!(provider_key, cooldown_ms = jittered, "circuit breaker opened");
            self.event_sink.provider_status_changed(provider_key, false).await;
        }
    }

    /// Current in-process state, for readiness checks and diagnostics.
    /// Unknown providers are reported `Closed` (no failures observed yet).
    pub fn state_of(&self, provider_key: &str) -> HealthState {
        self.local
            .get(provider_key)
            .map(|entry| entry.try_lock().map(|s| s.state).unwrap_or(HealthState::Closed))
            .unwrap_or(HealthState::Closed)
    }
}

fn push_outcome(outcomes: &mut VecDeque<bool>, ok: bool, cap: usize) {
    outcomes.push_back(ok);
    while outcomes.len() > cap {
        outcomes.pop_front();
    }
}

fn jitter(ms: u64) -> u64 {
    let spread = (ms as f64 * 0.10) as i64;
    if spread == 0 {
        return ms;
    }
    let delta = rand::rng().random_range(-spread..=spread);
    (ms as i64 + delta).max(0) as u64
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use ig_common::TracingEventSink;
    use ig_kvstore::InMemoryKVStore;

    use super::*;

    fn store() -> HealthStore {
        let config = HealthConfig {
            failure_rate_threshold: 0.5,
            minimum_requests: 10,
            half_open_success_threshold: 3,
            backoff: BackoffConfig {
                base_ms: 20,
                max_ms: 200,
                multiplier: 2.0,
            },
        };
        HealthStore::new(Arc::new(InMemoryKVStore::new()), config, Arc::new(TracingEventSink))
    }

    #[tokio::test]
    async fn closed_allows_requests() {
        let s = store();
        assert!(s.allow_request("a").await);
    }

    #[tokio::test]
    async fn opens_after_failure_threshold_and_recovers() {
        let s = store();
        for _ in 0..10 {
            assert!(s.allow_request("a").await);
            s.mark_failure("a").await;
        }
        assert_eq!(s.state_of("a"), HealthState::Open);
        assert!(!s.allow_request("a").await);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(s.allow_request("a").await);
        assert_eq!(s.state_of("a"), HealthState::HalfOpen);

        for _ in 0..3 {
            s.mark_success("a").await;
        }
        assert_eq!(s.state_of("a"), HealthState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens_with_longer_cooldown() {
        let s = store();
        for _ in 0..10 {
            s.mark_failure("a").await;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(s.allow_request("a").await);
        assert_eq!(s.state_of("a"), HealthState::HalfOpen);

        s.mark_failure("a").await;
        assert_eq!(s.state_of("a"), HealthState::Open);
        assert!(!s.allow_request("a").await);
    }

    #[tokio::test]
    async fn below_threshold_stays_closed() {
        let s = store();
        for _ in 0..4 {
            s.mark_failure("a").await;
        }
        for _ in 0..6 {
            s.mark_success("a").await;
        }
        assert_eq!(s.state_of("a"), HealthState::Closed);
        assert!(s.allow_request("a").await);
    }
}
