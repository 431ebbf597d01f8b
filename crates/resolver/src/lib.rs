//! Canonical-model / alias / combo resolution: turn whatever string a client
//! sent as `model` into an ordered, deduplicated, pruned list of provider
//! candidates to try.
//!
//! Tenant-scoped aliases and combos are not implemented — the config model
//! only has global aliases/combos for now — but `tenant_id` is threaded
//! through the signature so a tenant-scoped lookup can be added later
//! without changing call sites.

use ig_config::GatewayConfig;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ResolverError {
    #[error("canonical model or alias \"{0}\" not found")]
    CanonicalNotFound(String),
    #[error("no enabled provider for \"{0}\"")]
    NoEnabledProvider(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionReason {
    Direct,
    Alias,
    Combo,
}

/// A resolved candidate before cost/health/quota enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCandidate {
    pub canonical_id: String,
    pub provider_key: String,
    pub model_path: String,
    pub tier: u32,
}

#[derive(Debug, Clone)]
pub struct ResolutionResult {
    pub canonical_id: String,
    pub candidates: Vec<ResolvedCandidate>,
    pub reason: ResolutionReason,
}

pub struct Resolver<'a> {
    config: &'a GatewayConfig,
}

impl<'a> Resolver<'a> {
    #[must_use]
    pub fn new(config: &'a GatewayConfig) -> Self {
        Self { config }
    }

    /// `tenant_id` is currently unused — see module docs.
    pub fn resolve(
        &self,
        canonical_or_alias: &str,
        _tenant_id: Option<&str>,
    ) -> Result<ResolutionResult, ResolverError> {
        if let Some(combo) = self.config.combos.get(canonical_or_alias) {
            return self.expand_chain(canonical_or_alias, &combo.fallback_chain, ResolutionReason::Combo);
        }
        if let Some(alias) = self.config.aliases.get(canonical_or_alias) {
            return self.expand_chain(canonical_or_alias, &alias.candidates, ResolutionReason::Alias);
        }
        if self
            .config
            .canonical_models
            .iter()
            .any(|m| m.id == canonical_or_alias)
        {
            return self.expand_chain(
                canonical_or_alias,
                std::slice::from_ref(&canonical_or_alias.to_string()),
                ResolutionReason::Direct,
            );
        }
        Err(ResolverError::CanonicalNotFound(canonical_or_alias.to_string()))
    }

    fn expand_chain(
        &self,
        requested: &str,
        chain: &[String],
        reason: ResolutionReason,
    ) -> Result<ResolutionResult, ResolverError> {
        let mut seen = std::collections::HashSet::new();
        let mut candidates = Vec::new();

        for canonical_id in chain {
            let Some(model) = self.config.canonical_models.iter().find(|m| &m.id == canonical_id) else {
                continue;
            };
            let Some(provider) = self.config.providers.get(&model.provider_key) else {
                continue;
            };
            if !provider.enabled {
                continue;
            }
            let key = (provider.key.clone(), model.model_path.clone());
            if !seen.insert(key) {
                continue;
            }
            candidates.push(ResolvedCandidate {
                canonical_id: canonical_id.clone(),
                provider_key: provider.key.clone(),
                model_path: model.model_path.clone(),
                tier: provider.tier,
            });
        }

        if candidates.is_empty() {
            return Err(ResolverError::NoEnabledProvider(requested.to_string()));
        }

        Ok(ResolutionResult {
            canonical_id: requested.to_string(),
            candidates,
            reason,
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use ig_config::{AliasConfig, Capabilities, CanonicalModel, ComboConfig, ProviderConfig, ProviderKind};

    use super::*;

    fn provider(key: &str, tier: u32, enabled: bool) -> ProviderConfig {
        ProviderConfig {
            key: key.to_string(),
            kind: ProviderKind::OpenAi,
            tier,
            enabled,
            secret_ref: "X".to_string(),
            endpoint_override: None,
            rate_limit_rpm: None,
            rate_limit_tpm: None,
        }
    }

    fn model(id: &str, provider_key: &str, model_path: &str) -> CanonicalModel {
        CanonicalModel {
            id: id.to_string(),
            provider_key: provider_key.to_string(),
            model_path: model_path.to_string(),
            capabilities: Capabilities::default(),
        }
    }

    fn base_config() -> GatewayConfig {
        let mut providers = HashMap::new();
        providers.insert("a".to_string(), provider("a", 0, true));
        providers.insert("b".to_string(), provider("b", 1, true));
        providers.insert("c".to_string(), provider("c", 0, false));
        GatewayConfig {
            providers,
            canonical_models: vec![
                model("m1", "a", "model-a"),
                model("m1-b", "b", "model-b"),
                model("m1-c", "c", "model-c"),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn direct_canonical_resolves_single_candidate() {
        let cfg = base_config();
        let res = Resolver::new(&cfg).resolve("m1", None).unwrap();
        assert_eq!(res.reason, ResolutionReason::Direct);
        assert_eq!(res.candidates.len(), 1);
        assert_eq!(res.candidates[0].provider_key, "a");
    }

    #[test]
    fn alias_expands_in_order_and_prunes_disabled() {
        let mut cfg = base_config();
        cfg.aliases.insert(
            "best".to_string(),
            AliasConfig {
                candidates: vec!["m1-c".into(), "m1".into(), "m1-b".into()],
            },
        );
        let res = Resolver::new(&cfg).resolve("best", None).unwrap();
        assert_eq!(res.reason, ResolutionReason::Alias);
        // m1-c pruned (provider c disabled)
        assert_eq!(res.candidates.len(), 2);
        assert_eq!(res.candidates[0].provider_key, "a");
        assert_eq!(res.candidates[1].provider_key, "b");
    }

    #[test]
    fn combo_takes_precedence_over_alias_of_the_same_name() {
        let mut cfg = base_config();
        cfg.aliases.insert(
            "x".to_string(),
            AliasConfig {
                candidates: vec!["m1-b".into()],
            },
        );
        cfg.combos.insert(
            "x".to_string(),
            ComboConfig {
                fallback_chain: vec!["m1".into()],
            },
        );
        let res = Resolver::new(&cfg).resolve("x", None).unwrap();
        assert_eq!(res.reason, ResolutionReason::Combo);
        assert_eq!(res.candidates[0].provider_key, "a");
    }

    #[test]
    fn unknown_model_is_not_found() {
        let cfg = base_config();
        assert!(matches!(
            Resolver::new(&cfg).resolve("nope", None),
            Err(ResolverError::CanonicalNotFound(_))
        ));
    }

    #[test]
    fn all_disabled_providers_yields_no_enabled_provider() {
        let cfg = base_config();
        let res = Resolver::new(&cfg).resolve("m1-c", None);
        assert!(matches!(res, Err(ResolverError::NoEnabledProvider(_))));
    }

    #[test]
    fn duplicate_candidates_are_deduplicated_keeping_first() {
        let mut cfg = base_config();
        cfg.aliases.insert(
            "dup".to_string(),
            AliasConfig {
                candidates: vec!["m1".into(), "m1".into(), "m1-b".into()],
            },
        );
        let res = Resolver::new(&cfg).resolve("dup", None).unwrap();
        assert_eq!(res.candidates.len(), 2);
    }
}
