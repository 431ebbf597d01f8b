//! Maps a configured [`ProviderConfig`] to a concrete [`ProviderAdapter`].
//! The composition root (not the providers crate) owns this mapping since it
//! needs both the config schema and the provider implementations.

use std::sync::Arc;

use ig_config::{ProviderConfig, ProviderKind};
use ig_providers::{AuthScheme, CohereAdapter, GeminiAdapter, OpenAiCompatibleAdapter, ProviderAdapter};
use secrecy::Secret;

fn default_base_url(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::OpenAi => "https://api.openai.com/v1",
        ProviderKind::Groq => "https://api.groq.com/openai/v1",
        ProviderKind::Together => "https://api.together.xyz/v1",
        ProviderKind::DeepInfra => "https://api.deepinfra.com/v1/openai",
        ProviderKind::Cloudflare => "https://api.cloudflare.com/client/v4",
        ProviderKind::Gemini => "https://generativelanguage.googleapis.com",
        ProviderKind::Cohere => "https://api.cohere.com",
        ProviderKind::Antigravity => "https://api.antigravity.dev/v1",
    }
}

#[must_use]
pub fn build_adapter(provider: &ProviderConfig, secret: Secret<String>) -> Arc<dyn ProviderAdapter> {
    let base_url = provider
        .endpoint_override
        .clone()
        .unwrap_or_else(|| default_base_url(provider.kind).to_string());

    match provider.kind {
        ProviderKind::Gemini => Arc::new(GeminiAdapter::new(provider.key.clone(), base_url, secret)),
        ProviderKind::Cohere => Arc::new(CohereAdapter::new(provider.key.clone(), base_url, secret)),
        ProviderKind::Cloudflare => Arc::new(OpenAiCompatibleAdapter::new(
            provider.key.clone(),
            base_url,
            secret,
            AuthScheme::Header("X-Auth-Key"),
        )),
        ProviderKind::OpenAi
        | ProviderKind::Groq
        | ProviderKind::Together
        | ProviderKind::DeepInfra
        | ProviderKind::Antigravity => {
            Arc::new(OpenAiCompatibleAdapter::new(provider.key.clone(), base_url, secret, AuthScheme::Bearer))
        },
    }
}
