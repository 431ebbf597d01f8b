//! `(providerKey, modelPath) -> cost` lookup the router consults when
//! ranking candidates. The table is loaded from config rather than hardcoded,
//! since per-token pricing changes far more often than code does.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A fallback cost assigned to candidates with no table entry. Large enough
/// that an unpriced candidate always ranks behind every priced one, rather
/// than being silently treated as free.
pub const UNKNOWN_COST_PER_M_TOKEN: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CostInfo {
    pub input_cost_per_m_token: f64,
    pub output_cost_per_m_token: f64,
    pub is_free: bool,
}

impl CostInfo {
    #[must_use]
    pub fn total_per_m_token(&self) -> f64 {
        self.input_cost_per_m_token + self.output_cost_per_m_token
    }

    fn unknown() -> Self {
        Self {
            input_cost_per_m_token: UNKNOWN_COST_PER_M_TOKEN,
            output_cost_per_m_token: UNKNOWN_COST_PER_M_TOKEN,
            is_free: false,
        }
    }
}

/// A single row of the configured cost table: pricing for one
/// `(providerKey, modelPath)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEntry {
    pub provider_key: String,
    pub model_path: String,
    #[serde(flatten)]
    pub cost: CostInfo,
}

/// In-memory cost table, built once from config at startup.
#[derive(Debug, Clone, Default)]
pub struct CostService {
    table: HashMap<(String, String), CostInfo>,
}

impl CostService {
    #[must_use]
    pub fn new(entries: Vec<CostEntry>) -> Self {
        let table = entries
            .into_iter()
            .map(|e| ((e.provider_key, e.model_path), e.cost))
            .collect();
        Self { table }
    }

    /// Cost for a provider/model pair. Missing entries fall back to
    /// [`CostInfo::unknown`] and log a warning, so an un-priced candidate
    /// is still rankable but never outranks a priced one.
    #[must_use]
    pub fn lookup(&self, provider_key: &str, model_path: &str) -> CostInfo {
        match self.table.get(&(provider_key.to_string(), model_path.to_string())) {
            Some(cost) => *cost,
            None => {
                tracing::warn!(provider_key, model_path, "no cost entry configured, ranking as unpriced");
                CostInfo::unknown()
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_entry_is_returned() {
        let svc = CostService::new(vec![CostEntry {
            provider_key: "openai".into(),
            model_path: "gpt-4o".into(),
            cost: CostInfo {
                input_cost_per_m_token: 2.5,
                output_cost_per_m_token: 10.0,
                is_free: false,
            },
        }]);
        let cost = svc.lookup("openai", "gpt-4o");
        assert_eq!(cost.total_per_m_token(), 12.5);
        assert!(!cost.is_free);
    }

    #[test]
    fn missing_entry_ranks_as_unpriced_not_free() {
        let svc = CostService::default();
        let cost = svc.lookup("groq", "llama-3.1-70b");
        assert!(!cost.is_free);
        assert_eq!(cost.total_per_m_token(), 2.0 * UNKNOWN_COST_PER_M_TOKEN);
    }

    #[test]
    fn free_tier_entry_is_preserved() {
        let svc = CostService::new(vec![CostEntry {
            provider_key: "cloudflare".into(),
            model_path: "llama-3-8b".into(),
            cost: CostInfo {
                input_cost_per_m_token: 0.0,
                output_cost_per_m_token: 0.0,
                is_free: true,
            },
        }]);
        assert!(svc.lookup("cloudflare", "llama-3-8b").is_free);
    }
}
