//! Composition root: wires the kvstore-backed health/quota singletons, the
//! atomically-reloadable config snapshot, and the per-provider adapters into
//! one `AppState` shared across every request.

use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
};

use arc_swap::ArcSwap;
use ig_common::{Clock, EventSink, SystemClock, TracingEventSink, TracingUsageSink, UsageSink};
use ig_config::GatewayConfig;
use ig_cost::CostService;
use ig_health::HealthStore;
use ig_kvstore::{InMemoryKVStore, KVStore};
use ig_providers::ProviderAdapter;
use ig_quota::QuotaTracker;
use ig_router::{ProviderLimits, Router as CandidateRouter};
use secrecy::Secret;

use crate::adapters::build_adapter;

pub struct AppState {
    pub config: ArcSwap<GatewayConfig>,
    pub adapters: ArcSwap<HashMap<String, Arc<dyn ProviderAdapter>>>,
    pub kv: Arc<dyn KVStore>,
    pub health: Arc<HealthStore>,
    pub quota: Arc<QuotaTracker>,
    pub router: Arc<CandidateRouter>,
    pub usage_sink: Arc<dyn UsageSink>,
    pub event_sink: Arc<dyn EventSink>,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<ig_metrics::MetricsHandle>,
}

impl AppState {
    /// Build a fresh `AppState` from a loaded config, using the in-memory
    /// KVStore and tracing-based sinks. Passing an externally-backed
    /// `KVStore` (and real auth/usage/event sinks) is how a deployment wires
    /// in its own tenant/billing system without touching this crate.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_kvstore(config, Arc::new(InMemoryKVStore::new()))
    }

    #[must_use]
    pub fn with_kvstore(config: GatewayConfig, kv: Arc<dyn KVStore>) -> Self {
        let event_sink: Arc<dyn EventSink> = Arc::new(TracingEventSink);
        let health = Arc::new(HealthStore::new(kv.clone(), config.health.to_health_config(), event_sink.clone()));
        let quota = Arc::new(QuotaTracker::new(kv.clone(), event_sink.clone()));
        let cost = Arc::new(CostService::new(config.cost_table.clone()));
        let router = Arc::new(CandidateRouter::new(cost, health.clone(), quota.clone()));
        let adapters = build_adapters(&config);

        Self {
            config: ArcSwap::from_pointee(config),
            adapters: ArcSwap::from_pointee(adapters),
            kv,
            health,
            quota,
            router,
            usage_sink: Arc::new(TracingUsageSink),
            event_sink,
            clock: Arc::new(SystemClock),
            metrics: Arc::new(metrics_handle()),
        }
    }

    /// Atomically replace the routing config and rebuild the adapter set.
    /// Health/quota singletons are untouched — their tuning is fixed at
    /// startup, so a reload only changes which providers/models are routable.
    pub fn reload(&self, config: GatewayConfig) {
        let adapters = build_adapters(&config);
        self.adapters.store(Arc::new(adapters));
        self.config.store(Arc::new(config));
    }

    #[must_use]
    pub fn adapter_for(&self, provider_key: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.load().get(provider_key).cloned()
    }
}

/// The Prometheus recorder is global to the process, so only the first
/// `AppState` built (per process) actually installs it; later ones, e.g. in
/// tests that construct several `AppState`s, reuse the cached handle.
#[allow(clippy::expect_used)] // recorder install is infallible once per process; OnceLock::get_or_try_init is unstable.
fn metrics_handle() -> ig_metrics::MetricsHandle {
    static HANDLE: OnceLock<ig_metrics::MetricsHandle> = OnceLock::new();
    HANDLE
        .get_or_init(|| {
            ig_metrics::init_metrics(ig_metrics::MetricsRecorderConfig { enabled: true, ..Default::default() })
                .expect("metrics recorder installs exactly once per process")
        })
        .clone()
}

fn build_adapters(config: &GatewayConfig) -> HashMap<String, Arc<dyn ProviderAdapter>> {
    let mut adapters = HashMap::new();
    for provider in config.providers.values() {
        if !provider.enabled {
            continue;
        }
        let Some(secret) = resolve_secret(&provider.secret_ref) else {
            tracing::warn!(provider_key = %provider.key, secret_ref = %provider.secret_ref, "no secret found, provider disabled");
            continue;
        };
        adapters.insert(provider.key.clone(), build_adapter(provider, secret));
    }
    adapters
}

fn resolve_secret(env_var: &str) -> Option<Secret<String>> {
    std::env::var(env_var).ok().filter(|v| !v.trim().is_empty()).map(Secret::new)
}

/// Reads RPM/TPM limits for a provider out of the live config snapshot.
pub struct ConfigProviderLimits<'a>(pub &'a GatewayConfig);

impl ProviderLimits for ConfigProviderLimits<'_> {
    fn limits(&self, provider_key: &str) -> (Option<u32>, Option<u32>) {
        match self.0.providers.get(provider_key) {
            Some(p) => (
                p.rate_limit_rpm.or(self.0.rate_limits.default_rpm),
                p.rate_limit_tpm.or(self.0.rate_limits.default_tpm),
            ),
            None => (self.0.rate_limits.default_rpm, self.0.rate_limits.default_tpm),
        }
    }
}
