//! Cohere's V2 chat API: `message`/`chat_history` instead of an OpenAI-style
//! `messages` array, and `event_type`-tagged SSE frames instead of plain
//! JSON deltas.

use std::pin::Pin;

use async_trait::async_trait;
use futures::StreamExt;
use ig_protocol::{ChatRequest, ChatResponse, FinishReason, StreamingChunk, Usage};
use secrecy::{ExposeSecret, Secret};
use tokio_stream::Stream;

use crate::{
    ProviderAdapter,
    error::{AdapterError, classify_status},
    openai_compat::{build_chat_response, build_streaming_chunk},
    retry::retry_transient,
};

pub struct CohereAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Secret<String>,
    provider_key: String,
}

impl CohereAdapter {
    #[must_use]
    pub fn new(provider_key: impl Into<String>, base_url: impl Into<String>, api_key: Secret<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            provider_key: provider_key.into(),
        }
    }

    fn to_cohere_body(req: &ChatRequest, model_path: &str, stream: bool) -> serde_json::Value {
        let messages: Vec<_> = req
            .messages
            .iter()
            .map(|m| {
                let role = match m.role.as_str() {
                    "assistant" => "assistant",
                    "system" => "system",
                    _ => "user",
                };
                serde_json::json!({
                    "role": role,
                    "content": m.content.as_ref().and_then(|c| c.as_str()).unwrap_or_default(),
                })
            })
            .collect();

        serde_json::json!({
            "model": model_path,
            "messages": messages,
            "stream": stream,
        })
    }
}

fn request_id() -> String {
    format!("cohere-{}", std::process::id())
}

#[async_trait]
impl ProviderAdapter for CohereAdapter {
    fn provider_key(&self) -> &str {
        &self.provider_key
    }

    async fn chat(&self, req: &ChatRequest, model_path: &str) -> Result<ChatResponse, AdapterError> {
        let body = Self::to_cohere_body(req, model_path, false);

        retry_transient(|| async {
            let resp = self
                .client
                .post(format!("{}/v2/chat", self.base_url))
                .header("Authorization", format!("Bearer {}", self.api_key.expose_secret()))
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(|e| AdapterError::Provider(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(classify_status(status.as_u16(), &text));
            }
            let parsed = resp
                .json::<serde_json::Value>()
                .await
                .map_err(|e| AdapterError::Provider(format!("malformed upstream response: {e}")))?;

            let text = parsed["message"]["content"][0]["text"].as_str().unwrap_or_default();
            let finish = match parsed["finish_reason"].as_str() {
                Some("MAX_TOKENS") => FinishReason::Length,
                _ => FinishReason::Stop,
            };
            let usage = Usage {
                prompt_tokens: parsed["usage"]["tokens"]["input_tokens"].as_u64().unwrap_or(0) as u32,
                completion_tokens: parsed["usage"]["tokens"]["output_tokens"].as_u64().unwrap_or(0) as u32,
                total_tokens: 0,
            };
            let mut usage = usage;
            usage.total_tokens = usage.prompt_tokens + usage.completion_tokens;

            Ok(build_chat_response(request_id(), model_path.to_string(), text.to_string(), finish, usage))
        })
        .await
    }

    fn stream_chat(
        &self,
        req: ChatRequest,
        model_path: String,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamingChunk, AdapterError>> + Send>> {
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let api_key = self.api_key.clone();

        Box::pin(async_stream::stream! {
            let body = Self::to_cohere_body(&req, &model_path, true);

            let resp = match client
                .post(format!("{base_url}/v2/chat"))
                .header("Authorization", format!("Bearer {}", api_key.expose_secret()))
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    yield Err(AdapterError::Provider(e.to_string()));
                    return;
                },
            };

            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                yield Err(classify_status(status.as_u16(), &text));
                return;
            }

            let mut byte_stream = resp.bytes_stream();
            let mut buf = String::new();
            let mut first = true;

            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(AdapterError::Provider(e.to_string()));
                        return;
                    },
                };
                buf.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = buf.find('\n') {
                    let line = buf[..pos].trim().to_string();
                    buf = buf[pos + 1..].to_string();
                    if line.is_empty() {
                        continue;
                    }
                    let Ok(evt) = serde_json::from_str::<serde_json::Value>(&line) else {
                        continue;
                    };
                    match evt["type"].as_str() {
                        Some("content-delta") => {
                            let text = evt["delta"]["message"]["content"]["text"].as_str();
                            if let Some(text) = text {
                                yield Ok(build_streaming_chunk(request_id(), model_path.clone(), Some(text.to_string()), None, first));
                                first = false;
                            }
                        },
                        Some("message-end") => {
                            yield Ok(build_streaming_chunk(request_id(), model_path.clone(), None, Some(FinishReason::Stop), false));
                            return;
                        },
                        _ => {},
                    }
                }
            }
        })
    }
}
