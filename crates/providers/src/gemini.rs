//! Gemini's `generateContent` wire format diverges enough from OpenAI's
//! (no `messages`/`choices`, a top-level `systemInstruction`, API key as a
//! header rather than bearer token) to warrant its own adapter rather than
//! a parameterization of [`crate::openai_compat::OpenAiCompatibleAdapter`].

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

pub struct GeminiAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Secret<String>,
    provider_key: String,
}

impl GeminiAdapter {
    #[must_use]
    pub fn new(provider_key: impl Into<String>, base_url: impl Into<String>, api_key: Secret<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            provider_key: provider_key.into(),
        }
    }

    fn to_gemini_body(req: &ChatRequest) -> serde_json::Value {
        let mut system_text = None;
        let mut contents = Vec::new();
        for m in &req.messages {
            let text = m.content.as_ref().and_then(|c| c.as_str()).unwrap_or_default();
            if m.role == "system" {
                system_text = Some(text.to_string());
                continue;
            }
            let role = if m.role == "assistant" { "model" } else { "user" };
            contents.push(serde_json::json!({ "role": role, "parts": [{ "text": text }] }));
        }

        let mut body = serde_json::json!({ "contents": contents });
        if let Some(sys) = system_text {
            body["systemInstruction"] = serde_json::json!({ "parts": [{ "text": sys }] });
        }
        if let Some(max_tokens) = req.max_tokens {
            body["generationConfig"] = serde_json::json!({ "maxOutputTokens": max_tokens });
        }
        body
    }

    fn parse_response(model: &str, body: &serde_json::Value) -> ChatResponse {
        let text = body["candidates"][0]["content"]["parts"][0]["text"].as_str().unwrap_or_default();
        let finish = match body["candidates"][0]["finishReason"].as_str() {
            Some("MAX_TOKENS") => FinishReason::Length,
            Some("SAFETY") | Some("RECITATION") => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        };
        let usage = Usage {
            prompt_tokens: body["usageMetadata"]["promptTokenCount"].as_u64().unwrap_or(0) as u32,
            completion_tokens: body["usageMetadata"]["candidatesTokenCount"].as_u64().unwrap_or(0) as u32,
            total_tokens: body["usageMetadata"]["totalTokenCount"].as_u64().unwrap_or(0) as u32,
        };
        build_chat_response(uuid_like(), model.to_string(), text.to_string(), finish, usage)
    }
}

fn uuid_like() -> String {
    format!("gemini-{}", std::process::id())
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn provider_key(&self) -> &str {
        &self.provider_key
    }

    async fn chat(&self, req: &ChatRequest, model_path: &str) -> Result<ChatResponse, AdapterError> {
        let body = Self::to_gemini_body(req);
        let url = format!("{}/v1beta/models/{model_path}:generateContent", self.base_url);

        retry_transient(|| async {
            let resp = self
                .client
                .post(&url)
                .header("x-goog-api-key", self.api_key.expose_secret())
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
            Ok(Self::parse_response(model_path, &parsed))
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
            let body = Self::to_gemini_body(&req);
            let url = format!("{base_url}/v1beta/models/{model_path}:streamGenerateContent?alt=sse");

            let resp = match client
                .post(&url)
                .header("x-goog-api-key", api_key.expose_secret())
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
                    let Some(data) = ig_protocol::sse::parse_data_line(&line) else {
                        continue;
                    };
                    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(data) else {
                        continue;
                    };
                    let text = parsed["candidates"][0]["content"]["parts"][0]["text"].as_str();
                    let finish_reason = parsed["candidates"][0]["finishReason"].as_str().map(|_| FinishReason::Stop);
                    if text.is_some() || finish_reason.is_some() {
                        yield Ok(build_streaming_chunk(
                            uuid_like(),
                            model_path.clone(),
                            text.map(str::to_string),
                            finish_reason,
                            first,
                        ));
                        first = false;
                    }
                }
            }
        })
    }
}
