//! OpenAI-compatible chat-completion wire format: request/response bodies
//! and SSE streaming frames. Provider adapters translate to/from this shape;
//! the gateway itself never speaks anything else over HTTP.

use serde::{Deserialize, Serialize};

/// One message in a chat conversation. `content` is left as a raw JSON
/// value rather than `String` because OpenAI-compatible clients may send
/// either a plain string or a content-part array (vision, tool results).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
    /// Fields neither this gateway nor any adapter interprets, preserved so
    /// an adapter that does understand them (provider-specific extensions)
    /// can still see them.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<FinishReason>,
}

/// One SSE `data:` event in a streaming chat-completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

/// JSON error body every non-2xx gateway response returns:
/// `{"error": {"code": "...", "message": "..."}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl ErrorShape {
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retryable: None,
        }
    }

    #[must_use]
    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorShape,
}

/// SSE framing: `data: {json}\n\n` lines, terminated by `data: [DONE]\n\n`.
pub mod sse {
    use super::StreamingChunk;

    pub const DONE_EVENT: &str = "data: [DONE]\n\n";

    /// Format one chunk as an SSE `data:` event.
    pub fn format_event(chunk: &StreamingChunk) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(chunk)?;
        Ok(format!("data: {json}\n\n"))
    }

    /// Extract the payload from one upstream SSE line, if it carries data.
    /// Non-`data:` lines (comments, blank keep-alives, `event:`/`id:`
    /// framing) return `None`. Returns `Some("[DONE]")` on the terminator so
    /// callers can match on it without re-parsing.
    #[must_use]
    pub fn parse_data_line(line: &str) -> Option<&str> {
        line.strip_prefix("data:").map(str::trim)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_round_trips_through_json() {
        let raw = r#"{"model":"m1","messages":[{"role":"user","content":"hi"}],"stream":true}"#;
        let req: ChatRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(req.model, "m1");
        assert!(req.stream);
        assert_eq!(req.messages[0].role, "user");
    }

    #[test]
    fn unknown_fields_are_preserved_via_extra() {
        let raw = r#"{"model":"m1","messages":[],"foo":"bar"}"#;
        let req: ChatRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(req.extra.get("foo").unwrap(), "bar");
    }

    #[test]
    fn sse_format_event_is_single_data_line_with_trailing_blank() {
        let chunk = StreamingChunk {
            id: "1".into(),
            object: "chat.completion.chunk".into(),
            created: 0,
            model: "m1".into(),
            choices: vec![],
        };
        let event = sse::format_event(&chunk).unwrap();
        assert!(event.starts_with("data: "));
        assert!(event.ends_with("\n\n"));
    }

    #[test]
    fn parse_data_line_strips_prefix_and_ignores_other_lines() {
        assert_eq!(sse::parse_data_line("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(sse::parse_data_line("data: [DONE]"), Some("[DONE]"));
        assert_eq!(sse::parse_data_line("event: ping"), None);
        assert_eq!(sse::parse_data_line(""), None);
    }

    #[test]
    fn error_body_serializes_to_spec_shape() {
        let body = ErrorBody {
            error: ErrorShape::new("rate_limited", "too many requests").retryable(true),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"]["code"], "rate_limited");
        assert_eq!(json["error"]["retryable"], true);
    }
}
