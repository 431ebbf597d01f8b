//! `POST /v1/chat/completions` — the one hot-path route. Branches on
//! `stream` after the pipeline has already picked (and committed to) a
//! candidate.

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::StreamExt;
use ig_common::{AuthContext, GatewayError};
use ig_protocol::sse;
use ig_protocol::ChatRequest;

use crate::{
    error::ApiError,
    pipeline::{ChatOutcome, ResponseMeta, run_chat},
    state::AppState,
};

fn meta_headers(meta: &ResponseMeta) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(v) = HeaderValue::from_str(&meta.provider_key) {
        headers.insert(HeaderName::from_static("x-provider-selected"), v);
    }
    if let Ok(v) = HeaderValue::from_str(&meta.model_path) {
        headers.insert(HeaderName::from_static("x-model-resolved"), v);
    }
    if meta.degraded {
        headers.insert(HeaderName::from_static("x-degraded"), HeaderValue::from_static("true"));
    }
    headers
}

pub async fn chat_completions(State(state): State<Arc<AppState>>, Json(req): Json<ChatRequest>) -> Response {
    let auth = AuthContext::anonymous();

    match run_chat(&state, req, &auth).await {
        Ok(ChatOutcome::Complete(resp, meta)) => (StatusCode::OK, meta_headers(&meta), Json(resp)).into_response(),
        Ok(ChatOutcome::Streaming(stream, meta)) => {
            let headers = meta_headers(&meta);
            let events = stream.map(|item| match item {
                Ok(chunk) => Ok(Event::default().data(serde_json::to_string(&chunk).unwrap_or_default())),
                Err(e) => Ok::<_, std::convert::Infallible>(Event::default().event("error").data(e.to_string())),
            });
            let body = events.chain(futures::stream::once(async { Ok::<_, std::convert::Infallible>(done_event()) }));
            let mut sse_response = Sse::new(body).keep_alive(KeepAlive::default()).into_response();
            sse_response.headers_mut().extend(headers);
            sse_response
        },
        Err(e) => {
            let status = e.status_code();
            let retryable_rate_limit = matches!(&e, GatewayError::UpstreamRateLimit { .. });
            let mut response = ApiError::from(e).into_response();
            if retryable_rate_limit && status == 503 {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static("x-ratelimit-remaining"), HeaderValue::from_static("0"));
            }
            response
        },
    }
}

/// `data: [DONE]\n\n` terminator is implicit in axum's `Sse` wrapper closing
/// the stream; the OpenAI wire contract additionally wants the literal
/// string, so the last real chunk is followed by one synthetic DONE event.
#[must_use]
pub fn done_event() -> Event {
    Event::default().data(sse::DONE_EVENT.trim_start_matches("data: ").trim_end())
}
