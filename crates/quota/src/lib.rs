//! Per-minute RPM/TPM quota tracker. `check_and_reserve` is a single atomic
//! compare-and-swap at the KVStore; a naive read-then-write would double-admit
//! under load, which is exactly what this exists to prevent.

use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use ig_common::EventSink;
use ig_kvstore::KVStore;

const WINDOW_SECS: u64 = 60;

/// Below this fraction of a configured limit, `record_usage` fires a
/// `quota_warning` event so an operator can see a provider approaching
/// exhaustion before requests start getting rejected.
const LOW_WATER_FRACTION: f64 = 0.10;

/// RPM/TPM headroom remaining in the current minute, for diagnostics and the
/// quota-warning event sink. `None` means the caller did not configure a
/// limit for that axis.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuotaRemaining {
    pub rpm_remaining: Option<i64>,
    pub tpm_remaining: Option<i64>,
}

pub struct QuotaTracker {
    kv: Arc<dyn KVStore>,
    event_sink: Arc<dyn EventSink>,
}

impl QuotaTracker {
    #[must_use]
    pub fn new(kv: Arc<dyn KVStore>, event_sink: Arc<dyn EventSink>) -> Self {
        Self { kv, event_sink }
    }

    /// Atomically admit one request against `rpm_limit`, after checking the
    /// current minute's token usage against `tpm_limit`. Returns `true` if
    /// neither limit is configured. Fails open (returns `true`, logs a
    /// warning) on KVStore errors — availability over strict quota.
    pub async fn check_and_reserve(
        &self,
        provider_key: &str,
        rpm_limit: Option<u32>,
        tpm_limit: Option<u32>,
    ) -> bool {
        if rpm_limit.is_none() && tpm_limit.is_none() {
            return true;
        }
        let minute = epoch_minute();

        if let Some(limit) = tpm_limit {
            match self.kv.get(&tpm_key(provider_key, minute)).await {
                Ok(Some(v)) => {
                    let current: i64 = v.parse().unwrap_or(0);
                    if current >= i64::from(limit) {
                        return false;
                    }
                },
                Ok(None) => {},
                Err(e) => {
                    tracing::warn!(provider_key, error = %e, "quota tracker KVStore read failed, failing open");
                    return true;
                },
            }
        }

        match rpm_limit {
            None => true,
            Some(limit) => {
                match self
                    .kv
                    .check_and_incr(
                        &rpm_key(provider_key, minute),
                        1,
                        i64::from(limit),
                        Duration::from_secs(WINDOW_SECS),
                    )
                    .await
                {
                    Ok(admitted) => admitted.is_some(),
                    Err(e) => {
                        tracing::warn!(provider_key, error = %e, "quota tracker KVStore write failed, failing open");
                        true
                    },
                }
            },
        }
    }

    /// Record actual token usage for the request that was just admitted, then
    /// emit `quota_warning` if either axis has dropped under the low-water
    /// threshold. Called post-hoc because total tokens aren't known until the
    /// upstream response completes.
    pub async fn record_usage(
        &self,
        provider_key: &str,
        input_tokens: u32,
        output_tokens: u32,
        rpm_limit: Option<u32>,
        tpm_limit: Option<u32>,
    ) {
        let minute = epoch_minute();
        let total = i64::from(input_tokens) + i64::from(output_tokens);
        if total > 0 {
            if let Err(e) = self
                .kv
                .incr_by(
                    &tpm_key(provider_key, minute),
                    total,
                    Some(Duration::from_secs(WINDOW_SECS)),
                )
                .await
            {
                tracing::warn!(provider_key, error = %e, "failed to record token usage");
            }
        }

        if rpm_limit.is_none() && tpm_limit.is_none() {
            return;
        }
        let remaining = self.remaining(provider_key, rpm_limit, tpm_limit).await;
        let low_rpm = below_low_water(remaining.rpm_remaining, rpm_limit);
        let low_tpm = below_low_water(remaining.tpm_remaining, tpm_limit);
        if low_rpm || low_tpm {
            let remaining_rpm = remaining.rpm_remaining.map(|v| v.max(0) as u32);
            let remaining_tpm = remaining.tpm_remaining.map(|v| v.max(0) as u32);
            self.event_sink.quota_warning(provider_key, remaining_rpm, remaining_tpm).await;
        }
    }

    /// Best-effort snapshot of remaining headroom, for the quota-warning
    /// event sink. Not used for admission decisions.
    pub async fn remaining(
        &self,
        provider_key: &str,
        rpm_limit: Option<u32>,
        tpm_limit: Option<u32>,
    ) -> QuotaRemaining {
        let minute = epoch_minute();
        let rpm_remaining = match rpm_limit {
            Some(limit) => {
                let current = self
                    .kv
                    .get(&rpm_key(provider_key, minute))
                    .await
                    .ok()
                    .flatten()
                    .and_then(|v| v.parse::<i64>().ok())
                    .unwrap_or(0);
                Some((i64::from(limit) - current).max(0))
            },
            None => None,
        };
        let tpm_remaining = match tpm_limit {
            Some(limit) => {
                let current = self
                    .kv
                    .get(&tpm_key(provider_key, minute))
                    .await
                    .ok()
                    .flatten()
                    .and_then(|v| v.parse::<i64>().ok())
                    .unwrap_or(0);
                Some((i64::from(limit) - current).max(0))
            },
            None => None,
        };
        QuotaRemaining {
            rpm_remaining,
            tpm_remaining,
        }
    }
}

fn below_low_water(remaining: Option<i64>, limit: Option<u32>) -> bool {
    match (remaining, limit) {
        (Some(r), Some(l)) if l > 0 => (r as f64) <= f64::from(l) * LOW_WATER_FRACTION,
        _ => false,
    }
}

fn epoch_minute() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() / WINDOW_SECS)
        .unwrap_or(0)
}

fn rpm_key(provider_key: &str, minute: u64) -> String {
    format!("rl:{provider_key}:rpm:{minute}")
}

fn tpm_key(provider_key: &str, minute: u64) -> String {
    format!("rl:{provider_key}:tpm:{minute}")
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ig_common::TracingEventSink;
    use ig_kvstore::InMemoryKVStore;

    use super::*;

    fn tracker() -> QuotaTracker {
        QuotaTracker::new(Arc::new(InMemoryKVStore::new()), Arc::new(TracingEventSink))
    }

    #[tokio::test]
    async fn unconfigured_limits_always_admit() {
        let q = tracker();
        for _ in 0..100 {
            assert!(q.check_and_reserve("a", None, None).await);
        }
    }

    #[tokio::test]
    async fn rpm_limit_admits_exactly_l() {
        let q = tracker();
        let mut admitted = 0;
        for _ in 0..5 {
            if q.check_and_reserve("a", Some(2), None).await {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 2);
    }

    #[tokio::test]
    async fn concurrent_requests_admit_exactly_min_k_l() {
        let q = Arc::new(tracker());
        let mut handles = Vec::new();
        for _ in 0..10 {
            let q = Arc::clone(&q);
            handles.push(tokio::spawn(async move {
                q.check_and_reserve("a", Some(3), None).await
            }));
        }
        let mut admitted = 0;
        for h in handles {
            if h.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 3);
    }

    #[tokio::test]
    async fn tpm_limit_blocks_once_usage_recorded() {
        let q = tracker();
        assert!(q.check_and_reserve("a", None, Some(100)).await);
        q.record_usage("a", 60, 50, None, Some(100)).await;
        assert!(!q.check_and_reserve("a", None, Some(100)).await);
    }

    #[tokio::test]
    async fn remaining_reflects_recorded_usage() {
        let q = tracker();
        q.record_usage("a", 10, 10, Some(5), Some(100)).await;
        let r = q.remaining("a", Some(5), Some(100)).await;
        assert_eq!(r.tpm_remaining, Some(80));
        assert_eq!(r.rpm_remaining, Some(5));
    }

    #[tokio::test]
    async fn low_remaining_does_not_panic_and_still_records() {
        let q = tracker();
        q.record_usage("a", 95, 0, Some(10), Some(100)).await;
        let r = q.remaining("a", Some(10), Some(100)).await;
        assert_eq!(r.tpm_remaining, Some(5));
    }
}
