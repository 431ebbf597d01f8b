//! Narrow interfaces the request pipeline depends on but does not implement.
//!
//! The gateway core never touches tenant/user/billing entities directly;
//! it only sees [`AuthContext`], [`UsageSink`], and [`EventSink`]. A real
//! deployment supplies its own implementation of each at the composition
//! root. The defaults here make the gateway runnable standalone.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Tenant/user identity resolved by the (out-of-scope) auth layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthContext {
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
}

impl AuthContext {
    /// An anonymous context used when no auth middleware is configured.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            tenant_id: None,
            user_id: None,
        }
    }
}

impl Default for AuthContext {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// A single completed request, emitted by the pipeline after every attempt
/// (successful or not). The core never persists this itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub provider_key: String,
    pub canonical_id: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub latency_ms: u64,
    pub ok: bool,
    pub error_code: Option<String>,
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

/// Receives [`UsageRecord`]s for downstream billing/audit systems.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn record(&self, record: UsageRecord);
}

/// A `UsageSink` that only logs via `tracing`, for standalone deployments.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingUsageSink;

#[async_trait]
impl UsageSink for TracingUsageSink {
    async fn record(&self, record: UsageRecord) {
        tracing::info!(
            provider_key = %record.provider_key,
            canonical_id = %record.canonical_id,
            input_tokens = record.input_tokens,
            output_tokens = record.output_tokens,
            latency_ms = record.latency_ms,
            ok = record.ok,
            error_code = record.error_code.as_deref().unwrap_or(""),
            "usage record"
        );
    }
}

/// Out-of-band notifications the source modelled as SignalR push events.
/// The transport is pluggable and non-essential for correctness; the default
/// implementation only logs.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn provider_status_changed(&self, provider_key: &str, healthy: bool);
    async fn quota_warning(&self, provider_key: &str, remaining_rpm: Option<u32>, remaining_tpm: Option<u32>);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn provider_status_changed(&self, provider_key: &str, healthy: bool) {
        tracing::warn!(provider_key, healthy, "provider status changed");
    }

    async fn quota_warning(
        &self,
        provider_key: &str,
        remaining_rpm: Option<u32>,
        remaining_tpm: Option<u32>,
    ) {
        tracing::warn!(provider_key, ?remaining_rpm, ?remaining_tpm, "quota running low");
    }
}

/// Abstracts wall-clock time so health/quota logic is deterministically
/// testable. The production implementation is a thin wrapper over
/// `std::time`; tests substitute a controllable clock.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// The real, system-time-backed clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}
