//! Request pipeline: resolve the requested model to ranked candidates, then
//! walk the ranking trying each one until a candidate succeeds, is rejected
//! for a non-retryable reason, or the list is exhausted.
//!
//! Health/quota admission is re-checked here (not just at ranking time) and
//! is the only place that actually reserves quota — `Router::rank` only
//! peeks. For streaming requests, fallback to the next candidate is only
//! possible before the first chunk reaches the client; once a byte has been
//! written the client is already mid-response, so a provider failure after
//! that point terminates the stream rather than silently retrying elsewhere.

use std::{pin::Pin, sync::Arc};

use futures::StreamExt;
use ig_common::{AuthContext, GatewayError, UsageRecord};
use ig_metrics::{counter, histogram, labels, router as router_metrics, upstream};
use ig_protocol::{ChatRequest, ChatResponse, StreamingChunk};
use ig_providers::AdapterError;
use ig_resolver::{Resolver, ResolverError};
use tokio_stream::Stream;

use crate::state::{AppState, ConfigProviderLimits};

#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub provider_key: String,
    pub canonical_id: String,
    pub model_path: String,
    pub degraded: bool,
}

pub enum ChatOutcome {
    Complete(ChatResponse, ResponseMeta),
    Streaming(Pin<Box<dyn Stream<Item = Result<StreamingChunk, GatewayError>> + Send>>, ResponseMeta),
}

fn map_adapter_error(e: &AdapterError) -> GatewayError {
    match e {
        AdapterError::Auth(detail) => GatewayError::UpstreamAuth { detail: detail.clone() },
        AdapterError::Validation(detail) => GatewayError::BadRequest(detail.clone()),
        AdapterError::RateLimit(detail) => GatewayError::UpstreamRateLimit { detail: detail.clone() },
        AdapterError::Provider(detail) => GatewayError::UpstreamTransient { detail: detail.clone() },
        AdapterError::Content(detail) => GatewayError::UpstreamContentFiltered(detail.clone()),
    }
}

pub async fn run_chat(state: &Arc<AppState>, req: ChatRequest, auth: &AuthContext) -> Result<ChatOutcome, GatewayError> {
    let config = state.config.load_full();
    let resolution = Resolver::new(&config)
        .resolve(&req.model, auth.tenant_id.as_deref())
        .map_err(|e| match e {
            ResolverError::CanonicalNotFound(m) => GatewayError::ModelNotFound(m),
            ResolverError::NoEnabledProvider(m) => GatewayError::NoEnabledProvider(m),
        })?;

    let limits = ConfigProviderLimits(&config);
    let ranked = state.router.rank(&resolution, &limits).await;
    counter!(router_metrics::RANK_REQUESTS_TOTAL).increment(1);
    histogram!(router_metrics::CANDIDATES_CONSIDERED).record(ranked.candidates.len() as f64);
    if ranked.degraded {
        counter!(router_metrics::DEGRADED_FALLBACKS_TOTAL).increment(1);
    }
    if ranked.candidates.is_empty() {
        return Err(GatewayError::NoEnabledProvider(resolution.canonical_id.clone()));
    }

    let mut last_error: Option<GatewayError> = None;

    'candidates: for candidate in &ranked.candidates {
        let Some(adapter) = state.adapter_for(&candidate.provider_key) else {
            continue;
        };

        let (rpm_limit, tpm_limit) = limits.limits(&candidate.provider_key);
        if !state.quota.check_and_reserve(&candidate.provider_key, rpm_limit, tpm_limit).await {
            continue;
        }
        if !state.health.allow_request(&candidate.provider_key).await {
            continue;
        }

        let meta = ResponseMeta {
            provider_key: candidate.provider_key.clone(),
            canonical_id: resolution.canonical_id.clone(),
            model_path: candidate.model_path.clone(),
            degraded: ranked.degraded,
        };

        if req.stream {
            let mut raw = adapter.stream_chat(req.clone(), candidate.model_path.clone());
            let started = state.clock.now_ms();
            counter!(upstream::ATTEMPTS_TOTAL, labels::PROVIDER_KEY => candidate.provider_key.clone())
                .increment(1);
            match raw.next().await {
                None => {
                    state.health.mark_failure(&candidate.provider_key).await;
                    counter!(
                        upstream::ATTEMPT_ERRORS_TOTAL,
                        labels::PROVIDER_KEY => candidate.provider_key.clone(),
                        labels::ERROR_CODE => "empty_stream",
                    )
                    .increment(1);
                    last_error = Some(GatewayError::UpstreamTransient {
                        detail: "upstream closed the stream before sending any data".to_string(),
                    });
                    continue 'candidates;
                },
                Some(Err(e)) => {
                    state.health.mark_failure(&candidate.provider_key).await;
                    let retryable = e.retryable_by_pipeline();
                    let gw = map_adapter_error(&e);
                    counter!(
                        upstream::ATTEMPT_ERRORS_TOTAL,
                        labels::PROVIDER_KEY => candidate.provider_key.clone(),
                        labels::ERROR_CODE => gw.code().to_string(),
                    )
                    .increment(1);
                    if !retryable {
                        return Err(gw);
                    }
                    last_error = Some(gw);
                    continue 'candidates;
                },
                Some(Ok(first_chunk)) => {
                    state.health.mark_success(&candidate.provider_key).await;
                    histogram!(upstream::TIME_TO_FIRST_TOKEN_SECONDS, labels::PROVIDER_KEY => candidate.provider_key.clone())
                        .record(state.clock.now_ms().saturating_sub(started) as f64 / 1000.0);

                    let provider_key = candidate.provider_key.clone();
                    let canonical_id = resolution.canonical_id.clone();
                    let tenant_id = auth.tenant_id.clone();
                    let user_id = auth.user_id.clone();
                    let health = state.health.clone();
                    let usage_sink = state.usage_sink.clone();
                    let clock = state.clock.clone();

                    let combined = async_stream::stream! {
                        yield Ok(first_chunk);
                        tokio::pin!(raw);
                        while let Some(item) = raw.next().await {
                            match item {
                                Ok(chunk) => yield Ok(chunk),
                                Err(e) => {
                                    health.mark_failure(&provider_key).await;
                                    yield Err(map_adapter_error(&e));
                                    return;
                                },
                            }
                        }
                        usage_sink
                            .record(UsageRecord {
                                provider_key,
                                canonical_id,
                                input_tokens: 0,
                                output_tokens: 0,
                                latency_ms: clock.now_ms().saturating_sub(started),
                                ok: true,
                                error_code: None,
                                tenant_id,
                                user_id,
                                occurred_at: chrono::Utc::now(),
                            })
                            .await;
                    };

                    return Ok(ChatOutcome::Streaming(Box::pin(combined), meta));
                },
            }
        }

        let started = state.clock.now_ms();
        counter!(upstream::ATTEMPTS_TOTAL, labels::PROVIDER_KEY => candidate.provider_key.clone())
            .increment(1);
        match adapter.chat(&req, &candidate.model_path).await {
            Ok(resp) => {
                state.health.mark_success(&candidate.provider_key).await;
                state
                    .quota
                    .record_usage(
                        &candidate.provider_key,
                        resp.usage.prompt_tokens,
                        resp.usage.completion_tokens,
                        rpm_limit,
                        tpm_limit,
                    )
                    .await;
                let elapsed_ms = state.clock.now_ms().saturating_sub(started);
                histogram!(upstream::ATTEMPT_DURATION_SECONDS, labels::PROVIDER_KEY => candidate.provider_key.clone())
                    .record(elapsed_ms as f64 / 1000.0);
                counter!(upstream::INPUT_TOKENS_TOTAL, labels::PROVIDER_KEY => candidate.provider_key.clone())
                    .increment(resp.usage.prompt_tokens as u64);
                counter!(upstream::OUTPUT_TOKENS_TOTAL, labels::PROVIDER_KEY => candidate.provider_key.clone())
                    .increment(resp.usage.completion_tokens as u64);
                state
                    .usage_sink
                    .record(UsageRecord {
                        provider_key: candidate.provider_key.clone(),
                        canonical_id: resolution.canonical_id.clone(),
                        input_tokens: resp.usage.prompt_tokens,
                        output_tokens: resp.usage.completion_tokens,
                        latency_ms: elapsed_ms,
                        ok: true,
                        error_code: None,
                        tenant_id: auth.tenant_id.clone(),
                        user_id: auth.user_id.clone(),
                        occurred_at: chrono::Utc::now(),
                    })
                    .await;
                return Ok(ChatOutcome::Complete(resp, meta));
            },
            Err(e) => {
                state.health.mark_failure(&candidate.provider_key).await;
                let retryable = e.retryable_by_pipeline();
                let gw = map_adapter_error(&e);
                let elapsed_ms = state.clock.now_ms().saturating_sub(started);
                histogram!(upstream::ATTEMPT_DURATION_SECONDS, labels::PROVIDER_KEY => candidate.provider_key.clone())
                    .record(elapsed_ms as f64 / 1000.0);
                counter!(
                    upstream::ATTEMPT_ERRORS_TOTAL,
                    labels::PROVIDER_KEY => candidate.provider_key.clone(),
                    labels::ERROR_CODE => gw.code().to_string(),
                )
                .increment(1);
                state
                    .usage_sink
                    .record(UsageRecord {
                        provider_key: candidate.provider_key.clone(),
                        canonical_id: resolution.canonical_id.clone(),
                        input_tokens: 0,
                        output_tokens: 0,
                        latency_ms: elapsed_ms,
                        ok: false,
                        error_code: Some(gw.code().to_string()),
                        tenant_id: auth.tenant_id.clone(),
                        user_id: auth.user_id.clone(),
                        occurred_at: chrono::Utc::now(),
                    })
                    .await;
                if !retryable {
                    return Err(gw);
                }
                last_error = Some(gw);
                continue 'candidates;
            },
        }
    }

    Err(last_error.unwrap_or(GatewayError::NoHealthyProviders))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use ig_common::AuthContext;
    use ig_config::{Capabilities, CanonicalModel, GatewayConfig, ProviderConfig, ProviderKind};
    use ig_protocol::ChatMessage;

    use super::*;
    use crate::state::AppState;

    fn config_with_model(provider_key: &str) -> GatewayConfig {
        let mut providers = HashMap::new();
        providers.insert(
            provider_key.to_string(),
            ProviderConfig {
                key: provider_key.to_string(),
                kind: ProviderKind::OpenAi,
                tier: 0,
                enabled: true,
                secret_ref: "TEST_KEY_NOT_SET".to_string(),
                endpoint_override: None,
                rate_limit_rpm: None,
                rate_limit_tpm: None,
            },
        );
        GatewayConfig {
            providers,
            canonical_models: vec![CanonicalModel {
                id: "m1".to_string(),
                provider_key: provider_key.to_string(),
                model_path: "model-a".to_string(),
                capabilities: Capabilities::default(),
            }],
            ..Default::default()
        }
    }

    fn request(model: &str, stream: bool) -> ChatRequest {
        ChatRequest {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(serde_json::json!("hi")),
                name: None,
                tool_calls: None,
                tool_call_id: None,
            }],
            stream,
            temperature: None,
            top_p: None,
            max_tokens: None,
            tools: None,
            tool_choice: None,
            extra: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn unknown_model_is_not_found() {
        let state = Arc::new(AppState::new(config_with_model("p")));
        let err = run_chat(&state, request("nope", false), &AuthContext::anonymous()).await.unwrap_err();
        assert!(matches!(err, GatewayError::ModelNotFound(_)));
    }

    #[tokio::test]
    async fn no_secret_configured_exhausts_candidates_as_no_healthy_providers() {
        // secret_ref points at an env var that is never set, so build_adapters
        // never constructs an adapter for this provider and the candidate is
        // skipped at dispatch time rather than during ranking.
        let state = Arc::new(AppState::new(config_with_model("p")));
        let err = run_chat(&state, request("m1", false), &AuthContext::anonymous()).await.unwrap_err();
        assert!(matches!(err, GatewayError::NoHealthyProviders));
    }
}
