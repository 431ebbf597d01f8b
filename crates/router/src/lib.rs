//! Enrich resolved candidates with cost/tier/health/quota signals, filter
//! out ones that can't be tried right now, and rank what's left.
//!
//! The health and quota bits attached here are a non-mutating peek — the
//! actual atomic `QuotaTracker::check_and_reserve` happens once, in the
//! request pipeline, against the single candidate about to be attempted.
//! Reserving quota for every candidate during ranking would burn RPM budget
//! on providers the request never calls.

use std::sync::Arc;

use ig_cost::CostService;
use ig_health::HealthStore;
use ig_quota::QuotaTracker;
use ig_resolver::ResolutionResult;

/// Per-provider RPM/TPM limits, supplied by the caller (backed by
/// `GatewayConfig` in the gateway crate) so this crate doesn't need to know
/// about config file shapes.
pub trait ProviderLimits: Send + Sync {
    fn limits(&self, provider_key: &str) -> (Option<u32>, Option<u32>);
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedCandidate {
    pub provider_key: String,
    pub model_path: String,
    pub tier: u32,
    pub input_cost_per_m_token: f64,
    pub output_cost_per_m_token: f64,
    pub is_free_tier: bool,
    pub healthy: bool,
    pub quota_available: bool,
    pub breaker_allows: bool,
}

impl EnrichedCandidate {
    #[must_use]
    pub fn total_cost_per_m_token(&self) -> f64 {
        self.input_cost_per_m_token + self.output_cost_per_m_token
    }

    fn passes_filter(&self) -> bool {
        self.breaker_allows && self.healthy && self.quota_available
    }
}

pub struct RankedResult {
    pub candidates: Vec<EnrichedCandidate>,
    pub degraded: bool,
}

pub struct Router {
    cost: Arc<CostService>,
    health: Arc<HealthStore>,
    quota: Arc<QuotaTracker>,
}

impl Router {
    #[must_use]
    pub fn new(cost: Arc<CostService>, health: Arc<HealthStore>, quota: Arc<QuotaTracker>) -> Self {
        Self { cost, health, quota }
    }

    pub async fn rank(&self, resolution: &ResolutionResult, limits: &dyn ProviderLimits) -> RankedResult {
        let mut enriched = Vec::with_capacity(resolution.candidates.len());
        for candidate in &resolution.candidates {
            enriched.push(self.enrich(candidate, limits).await);
        }

        let filtered: Vec<_> = enriched.iter().cloned().filter(EnrichedCandidate::passes_filter).collect();

        let (mut ranked, degraded) = if filtered.is_empty() && !enriched.is_empty() {
            tracing::warn!(
                canonical_id = %resolution.canonical_id,
                "all candidates filtered by health/quota, falling back to degraded ranking"
            );
            (enriched, true)
        } else {
            (filtered, false)
        };

        ranked.sort_by(|a, b| {
            b.is_free_tier
                .cmp(&a.is_free_tier)
                .then(
                    a.total_cost_per_m_token()
                        .partial_cmp(&b.total_cost_per_m_token())
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(a.tier.cmp(&b.tier))
                .then(a.provider_key.cmp(&b.provider_key))
        });

        RankedResult {
            candidates: ranked,
            degraded,
        }
    }

    async fn enrich(
        &self,
        candidate: &ig_resolver::ResolvedCandidate,
        limits: &dyn ProviderLimits,
    ) -> EnrichedCandidate {
        let cost = self.cost.lookup(&candidate.provider_key, &candidate.model_path);
        let (rpm_limit, tpm_limit) = limits.limits(&candidate.provider_key);
        let remaining = self.quota.remaining(&candidate.provider_key, rpm_limit, tpm_limit).await;
        let quota_available = remaining.rpm_remaining.is_none_or(|r| r > 0)
            && remaining.tpm_remaining.is_none_or(|r| r > 0);
        let breaker_allows = self.health.allow_request(&candidate.provider_key).await;
        let healthy = self.health.state_of(&candidate.provider_key) != ig_health::HealthState::Open;

        EnrichedCandidate {
            provider_key: candidate.provider_key.clone(),
            model_path: candidate.model_path.clone(),
            tier: candidate.tier,
            input_cost_per_m_token: cost.input_cost_per_m_token,
            output_cost_per_m_token: cost.output_cost_per_m_token,
            is_free_tier: cost.is_free,
            healthy,
            quota_available,
            breaker_allows,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use ig_common::TracingEventSink;
    use ig_kvstore::InMemoryKVStore;
    use ig_resolver::{ResolutionReason, ResolvedCandidate};

    use super::*;

    struct NoLimits;
    impl ProviderLimits for NoLimits {
        fn limits(&self, _provider_key: &str) -> (Option<u32>, Option<u32>) {
            (None, None)
        }
    }

    fn router_with_costs(entries: Vec<ig_cost::CostEntry>) -> Router {
        let kv = Arc::new(InMemoryKVStore::new());
        Router::new(
            Arc::new(CostService::new(entries)),
            Arc::new(HealthStore::new(
                kv.clone(),
                ig_health::HealthConfig::default(),
                Arc::new(TracingEventSink),
            )),
            Arc::new(QuotaTracker::new(kv, Arc::new(TracingEventSink))),
        )
    }

    fn resolution(candidates: Vec<(&str, &str, u32)>) -> ResolutionResult {
        ResolutionResult {
            canonical_id: "m1".to_string(),
            reason: ResolutionReason::Direct,
            candidates: candidates
                .into_iter()
                .map(|(provider_key, model_path, tier)| ResolvedCandidate {
                    canonical_id: "m1".into(),
                    provider_key: provider_key.into(),
                    model_path: model_path.into(),
                    tier,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn free_tier_beats_cheaper_paid() {
        let router = router_with_costs(vec![
            ig_cost::CostEntry {
                provider_key: "paid".into(),
                model_path: "m".into(),
                cost: ig_cost::CostInfo {
                    input_cost_per_m_token: 0.01,
                    output_cost_per_m_token: 0.01,
                    is_free: false,
                },
            },
            ig_cost::CostEntry {
                provider_key: "free".into(),
                model_path: "m".into(),
                cost: ig_cost::CostInfo {
                    input_cost_per_m_token: 0.0,
                    output_cost_per_m_token: 0.0,
                    is_free: true,
                },
            },
        ]);
        let res = resolution(vec![("paid", "m", 0), ("free", "m", 0)]);
        let ranked = router.rank(&res, &NoLimits).await;
        assert_eq!(ranked.candidates[0].provider_key, "free");
    }

    #[tokio::test]
    async fn ties_break_on_tier_then_provider_key() {
        let router = router_with_costs(vec![]);
        let res = resolution(vec![("b", "m", 0), ("a", "m", 0)]);
        let ranked = router.rank(&res, &NoLimits).await;
        assert_eq!(ranked.candidates[0].provider_key, "a");
        assert_eq!(ranked.candidates[1].provider_key, "b");
        assert!(!ranked.degraded);
    }

    #[tokio::test]
    async fn open_breaker_excludes_candidate_unless_degraded() {
        let kv = Arc::new(InMemoryKVStore::new());
        let health = Arc::new(HealthStore::new(
            kv.clone(),
            ig_health::HealthConfig {
                minimum_requests: 1,
                ..Default::default()
            },
            Arc::new(TracingEventSink),
        ));
        health.mark_failure("bad").await;
        let router = Router::new(
            Arc::new(CostService::default()),
            health,
            Arc::new(QuotaTracker::new(kv, Arc::new(TracingEventSink))),
        );
        let res = resolution(vec![("bad", "m", 0), ("good", "m", 0)]);
        let ranked = router.rank(&res, &NoLimits).await;
        assert_eq!(ranked.candidates.len(), 1);
        assert_eq!(ranked.candidates[0].provider_key, "good");
        assert!(!ranked.degraded);
    }

    #[tokio::test]
    async fn all_unhealthy_falls_back_to_degraded_mode() {
        let kv = Arc::new(InMemoryKVStore::new());
        let health = Arc::new(HealthStore::new(
            kv.clone(),
            ig_health::HealthConfig {
                minimum_requests: 1,
                ..Default::default()
            },
            Arc::new(TracingEventSink),
        ));
        health.mark_failure("only").await;
        let router = Router::new(
            Arc::new(CostService::default()),
            health,
            Arc::new(QuotaTracker::new(kv, Arc::new(TracingEventSink))),
        );
        let res = resolution(vec![("only", "m", 0)]);
        let ranked = router.rank(&res, &NoLimits).await;
        assert_eq!(ranked.candidates.len(), 1);
        assert!(ranked.degraded);
    }
}
