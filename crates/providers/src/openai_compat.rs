//! A single adapter for every upstream that speaks the OpenAI chat-completion
//! wire format natively: OpenAI itself, Groq, Together, DeepInfra,
//! Cloudflare Workers AI, and Antigravity. They differ only in base URL and
//! (occasionally) the auth header scheme, so one adapter parameterized by
//! both covers all six instead of duplicating the request/response/SSE
//! translation six times.

use std::pin::Pin;

use async_trait::async_trait;
use futures::StreamExt;
use ig_protocol::{ChatRequest, ChatResponse, Choice, Delta, ChunkChoice, FinishReason, StreamingChunk, Usage, sse};
use secrecy::{ExposeSecret, Secret};
use tokio_stream::Stream;

use crate::{ProviderAdapter, error::{AdapterError, classify_status}, retry::retry_transient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// A custom header name carrying the raw key, e.g. Cloudflare's
    /// `X-Auth-Key`.
    Header(&'static str),
}

pub struct OpenAiCompatibleAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Secret<String>,
    auth_scheme: AuthScheme,
    provider_key: String,
}

impl OpenAiCompatibleAdapter {
    #[must_use]
    pub fn new(provider_key: impl Into<String>, base_url: impl Into<String>, api_key: Secret<String>, auth_scheme: AuthScheme) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            auth_scheme,
            provider_key: provider_key.into(),
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth_scheme {
            AuthScheme::Bearer => builder.header("Authorization", format!("Bearer {}", self.api_key.expose_secret())),
            AuthScheme::Header(name) => builder.header(name, self.api_key.expose_secret()),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatibleAdapter {
    fn provider_key(&self) -> &str {
        &self.provider_key
    }

    async fn chat(&self, req: &ChatRequest, model_path: &str) -> Result<ChatResponse, AdapterError> {
        let mut body = serde_json::to_value(req).map_err(|e| AdapterError::Validation(e.to_string()))?;
        body["model"] = serde_json::Value::String(model_path.to_string());
        body["stream"] = serde_json::Value::Bool(false);

        retry_transient(|| async {
            let resp = self
                .authorize(self.client.post(format!("{}/chat/completions", self.base_url)))
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

            resp.json::<ChatResponse>()
                .await
                .map_err(|e| AdapterError::Provider(format!("malformed upstream response: {e}")))
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
        let auth_scheme = self.auth_scheme;

        Box::pin(async_stream::stream! {
            let mut body = match serde_json::to_value(&req) {
                Ok(v) => v,
                Err(e) => {
                    yield Err(AdapterError::Validation(e.to_string()));
                    return;
                },
            };
            body["model"] = serde_json::Value::String(model_path);
            body["stream"] = serde_json::Value::Bool(true);

            let mut builder = client.post(format!("{base_url}/chat/completions"));
            builder = match auth_scheme {
                AuthScheme::Bearer => builder.header("Authorization", format!("Bearer {}", api_key.expose_secret())),
                AuthScheme::Header(name) => builder.header(name, api_key.expose_secret()),
            };

            let resp = match builder.header("content-type", "application/json").json(&body).send().await {
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

            'outer: while let Some(chunk) = byte_stream.next().await {
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

                    let Some(data) = sse::parse_data_line(&line) else {
                        continue;
                    };
                    if data == "[DONE]" {
                        break 'outer;
                    }
                    match serde_json::from_str::<StreamingChunk>(data) {
                        Ok(parsed) => yield Ok(parsed),
                        Err(e) => tracing::warn!(error = %e, "skipping malformed upstream SSE chunk"),
                    }
                }
            }
        })
    }
}

/// Build a non-streaming [`ChatResponse`] from a handful of already-decoded
/// fields. Used by the non-OpenAI-native adapters (Cohere, Gemini), which
/// translate their own response shape and then funnel through this to avoid
/// duplicating the envelope construction.
#[must_use]
pub fn build_chat_response(id: String, model: String, content: String, finish_reason: FinishReason, usage: Usage) -> ChatResponse {
    ChatResponse {
        id,
        object: "chat.completion".to_string(),
        created: 0,
        model,
        choices: vec![Choice {
            index: 0,
            message: ig_protocol::ChatMessage {
                role: "assistant".to_string(),
                content: Some(serde_json::Value::String(content)),
                name: None,
                tool_calls: None,
                tool_call_id: None,
            },
            finish_reason: Some(finish_reason),
        }],
        usage,
    }
}

#[must_use]
pub fn build_streaming_chunk(id: String, model: String, content: Option<String>, finish_reason: Option<FinishReason>, first: bool) -> StreamingChunk {
    StreamingChunk {
        id,
        object: "chat.completion.chunk".to_string(),
        created: 0,
        model,
        choices: vec![ChunkChoice {
            index: 0,
            delta: Delta {
                role: first.then(|| "assistant".to_string()),
                content,
            },
            finish_reason,
        }],
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use ig_protocol::ChatMessage;

    use super::*;

    fn request() -> ChatRequest {
        ChatRequest {
            model: "m1".into(),
            messages: vec![ChatMessage {
                role: "user".into(),
                content: Some(serde_json::json!("hi")),
                name: None,
                tool_calls: None,
                tool_call_id: None,
            }],
            stream: false,
            temperature: None,
            top_p: None,
            max_tokens: None,
            tools: None,
            tool_choice: None,
            extra: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn chat_success_deserializes_response() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "id": "abc",
                    "object": "chat.completion",
                    "created": 0,
                    "model": "m1",
                    "choices": [{"index":0,"message":{"role":"assistant","content":"hi"},"finish_reason":"stop"}],
                    "usage": {"prompt_tokens":1,"completion_tokens":1,"total_tokens":2}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let adapter = OpenAiCompatibleAdapter::new("openai", server.url(), Secret::new("key".into()), AuthScheme::Bearer);
        let resp = adapter.chat(&request(), "gpt-4o").await.unwrap();
        assert_eq!(resp.id, "abc");
    }

    #[tokio::test]
    async fn chat_401_classified_as_auth_and_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body("unauthorized")
            .expect(1)
            .create_async()
            .await;

        let adapter = OpenAiCompatibleAdapter::new("openai", server.url(), Secret::new("key".into()), AuthScheme::Bearer);
        let err = adapter.chat(&request(), "gpt-4o").await.unwrap_err();
        assert!(matches!(err, AdapterError::Auth(_)));
        mock.assert_async().await;
    }
}
