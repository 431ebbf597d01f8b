//! One adapter per upstream kind, behind a single object-safe
//! [`ProviderAdapter`] trait. The request pipeline never branches on
//! provider kind — it holds `Arc<dyn ProviderAdapter>` and calls `chat` or
//! `stream_chat` uniformly.

pub mod cohere;
pub mod error;
pub mod gemini;
pub mod openai_compat;
mod retry;

use std::pin::Pin;

use async_trait::async_trait;
use ig_protocol::{ChatRequest, ChatResponse, StreamingChunk};
use tokio_stream::Stream;

pub use cohere::CohereAdapter;
pub use error::AdapterError;
pub use gemini::GeminiAdapter;
pub use openai_compat::{AuthScheme, OpenAiCompatibleAdapter};

/// Every inbound client request body is capped at this size; adapters reject
/// (rather than buffer) anything larger, whether declared via
/// `Content-Length` or discovered mid-stream.
pub const MAX_REQUEST_BODY_BYTES: usize = 10 * 1024 * 1024;

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// The provider this adapter instance is bound to — used as the
    /// KVStore/health/quota namespace.
    fn provider_key(&self) -> &str;

    async fn chat(&self, req: &ChatRequest, model_path: &str) -> Result<ChatResponse, AdapterError>;

    fn stream_chat(
        &self,
        req: ChatRequest,
        model_path: String,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamingChunk, AdapterError>> + Send>>;
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use secrecy::Secret;

    use super::*;

    #[test]
    fn provider_key_is_exposed_uniformly_across_adapters() {
        let a: std::sync::Arc<dyn ProviderAdapter> = std::sync::Arc::new(OpenAiCompatibleAdapter::new(
            "openai",
            "http://localhost",
            Secret::new("k".into()),
            AuthScheme::Bearer,
        ));
        assert_eq!(a.provider_key(), "openai");

        let b: std::sync::Arc<dyn ProviderAdapter> =
            std::sync::Arc::new(GeminiAdapter::new("gemini", "http://localhost", Secret::new("k".into())));
        assert_eq!(b.provider_key(), "gemini");
    }
}
