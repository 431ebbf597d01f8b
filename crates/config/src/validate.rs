//! Static checks run over a loaded [`GatewayConfig`] before it's put into
//! service — dangling references are cheap to catch here and expensive to
//! debug as a 404 three hops downstream.

use crate::schema::GatewayConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }
}

#[must_use]
pub fn validate(config: &GatewayConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();

    for (map_key, provider) in &config.providers {
        if map_key != &provider.key {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                message: format!(
                    "provider table key \"{map_key}\" does not match its Key field \"{}\"",
                    provider.key
                ),
            });
        }
    }

    for model in &config.canonical_models {
        if !config.providers.contains_key(&model.provider_key) {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                message: format!(
                    "canonical model \"{}\" references unknown provider \"{}\"",
                    model.id, model.provider_key
                ),
            });
        }
    }

    let known_ids = |id: &str| config.canonical_models.iter().any(|m| m.id == id);

    for (name, alias) in &config.aliases {
        if alias.candidates.is_empty() {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                message: format!("alias \"{name}\" has no candidates"),
            });
        }
        for candidate in &alias.candidates {
            if !known_ids(candidate) {
                diagnostics.push(Diagnostic {
                    severity: Severity::Error,
                    message: format!("alias \"{name}\" references unknown canonical model \"{candidate}\""),
                });
            }
        }
    }

    for (name, combo) in &config.combos {
        if combo.fallback_chain.is_empty() {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                message: format!("combo \"{name}\" has an empty fallback chain"),
            });
        }
        for candidate in &combo.fallback_chain {
            if !known_ids(candidate) {
                diagnostics.push(Diagnostic {
                    severity: Severity::Error,
                    message: format!("combo \"{name}\" references unknown canonical model \"{candidate}\""),
                });
            }
        }
    }

    if config.providers.values().all(|p| !p.enabled) && !config.providers.is_empty() {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            message: "every configured provider is disabled".to_string(),
        });
    }

    ValidationResult { diagnostics }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::schema::{CanonicalModel, ProviderConfig, ProviderKind};

    use super::*;

    fn provider(key: &str) -> ProviderConfig {
        ProviderConfig {
            key: key.to_string(),
            kind: ProviderKind::OpenAi,
            tier: 0,
            enabled: true,
            secret_ref: "X".to_string(),
            endpoint_override: None,
            rate_limit_rpm: None,
            rate_limit_tpm: None,
        }
    }

    #[test]
    fn clean_config_has_no_errors() {
        let mut providers = HashMap::new();
        providers.insert("openai".to_string(), provider("openai"));
        let config = GatewayConfig {
            providers,
            canonical_models: vec![CanonicalModel {
                id: "gpt-4o".into(),
                provider_key: "openai".into(),
                model_path: "gpt-4o".into(),
                capabilities: Default::default(),
            }],
            ..Default::default()
        };
        assert!(!validate(&config).has_errors());
    }

    #[test]
    fn dangling_provider_reference_is_an_error() {
        let config = GatewayConfig {
            canonical_models: vec![CanonicalModel {
                id: "gpt-4o".into(),
                provider_key: "missing".into(),
                model_path: "gpt-4o".into(),
                capabilities: Default::default(),
            }],
            ..Default::default()
        };
        assert!(validate(&config).has_errors());
    }
}
