//! Typed view of the gateway's config file: providers, canonical models,
//! aliases, combos, rate-limit defaults, and health/breaker tuning.

use std::collections::HashMap;

use secrecy::Secret;
use serde::{Deserialize, Serialize};

/// Root of the config file. The `InferenceGateway` top-level key mirrors the
/// nesting convention of every format this loader accepts (TOML/YAML/JSON).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigFile {
    pub inference_gateway: GatewayConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GatewayConfig {
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub canonical_models: Vec<CanonicalModel>,
    #[serde(default)]
    pub aliases: HashMap<String, AliasConfig>,
    #[serde(default)]
    pub combos: HashMap<String, ComboConfig>,
    #[serde(default)]
    pub rate_limits: RateLimitsConfig,
    #[serde(default)]
    pub health: HealthSettings,
    #[serde(default)]
    pub cost_table: Vec<ig_cost::CostEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Groq,
    Cohere,
    Cloudflare,
    DeepInfra,
    Gemini,
    Together,
    Antigravity,
}

/// One upstream provider account. `key` is the stable identifier used
/// everywhere as the KVStore namespace — renaming it orphans in-flight
/// health/quota counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProviderConfig {
    pub key: String,
    pub kind: ProviderKind,
    #[serde(default)]
    pub tier: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub secret_ref: String,
    #[serde(default)]
    pub endpoint_override: Option<String>,
    #[serde(default)]
    pub rate_limit_rpm: Option<u32>,
    #[serde(default)]
    pub rate_limit_tpm: Option<u32>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Capabilities {
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub tools: bool,
    #[serde(default)]
    pub vision: bool,
    #[serde(default)]
    pub structured_output: bool,
    #[serde(default)]
    pub logprobs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CanonicalModel {
    pub id: String,
    pub provider_key: String,
    pub model_path: String,
    #[serde(default)]
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AliasConfig {
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComboConfig {
    pub fallback_chain: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RateLimitsConfig {
    #[serde(default)]
    pub default_rpm: Option<u32>,
    #[serde(default)]
    pub default_tpm: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BackoffSettings {
    pub base_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        let d = ig_health::BackoffConfig::default();
        Self {
            base_ms: d.base_ms,
            max_ms: d.max_ms,
            multiplier: d.multiplier,
        }
    }
}

/// Health/breaker tuning as it appears in the config file. `open_timeout_ms`
/// is accepted for parity with the original config shape; when present it
/// seeds `backoff.base_ms` instead of the hardcoded default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthSettings {
    #[serde(default)]
    pub failure_rate_threshold: Option<f64>,
    #[serde(default)]
    pub minimum_requests: Option<usize>,
    #[serde(default)]
    pub open_timeout_ms: Option<u64>,
    #[serde(default)]
    pub half_open_success_threshold: Option<u32>,
    #[serde(default)]
    pub backoff: Option<BackoffSettings>,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            failure_rate_threshold: None,
            minimum_requests: None,
            open_timeout_ms: None,
            half_open_success_threshold: None,
            backoff: None,
        }
    }
}

impl HealthSettings {
    #[must_use]
    pub fn to_health_config(&self) -> ig_health::HealthConfig {
        let defaults = ig_health::HealthConfig::default();
        let mut backoff = self
            .backoff
            .as_ref()
            .map(|b| ig_health::BackoffConfig {
                base_ms: b.base_ms,
                max_ms: b.max_ms,
                multiplier: b.multiplier,
            })
            .unwrap_or(defaults.backoff);
        if let Some(open_timeout_ms) = self.open_timeout_ms {
            if self.backoff.is_none() {
                backoff.base_ms = open_timeout_ms;
            }
        }
        ig_health::HealthConfig {
            failure_rate_threshold: self
                .failure_rate_threshold
                .unwrap_or(defaults.failure_rate_threshold),
            minimum_requests: self.minimum_requests.unwrap_or(defaults.minimum_requests),
            half_open_success_threshold: self
                .half_open_success_threshold
                .unwrap_or(defaults.half_open_success_threshold),
            backoff,
        }
    }
}

/// Resolved API key for a provider, loaded from `secret_ref` (an env var
/// name) at startup and never logged or serialized.
#[derive(Clone)]
pub struct ResolvedSecret(pub Secret<String>);

impl std::fmt::Debug for ResolvedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ResolvedSecret(<redacted>)")
    }
}
