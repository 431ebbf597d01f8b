//! Every non-2xx upstream response is classified into one of these
//! categories so the request pipeline knows whether to retry the next
//! candidate or bubble the error straight to the client.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum AdapterError {
    #[error("upstream authentication failed: {0}")]
    Auth(String),
    #[error("upstream rejected the request as invalid: {0}")]
    Validation(String),
    #[error("upstream rate-limited the request: {0}")]
    RateLimit(String),
    #[error("upstream provider error: {0}")]
    Provider(String),
    #[error("upstream filtered the response content: {0}")]
    Content(String),
}

impl AdapterError {
    /// Whether the request pipeline should advance to the next candidate
    /// (`RateLimit`/`Provider`) or bubble the error straight to the client
    /// (`Auth`/`Validation`/`Content`).
    #[must_use]
    pub fn retryable_by_pipeline(&self) -> bool {
        matches!(self, Self::RateLimit(_) | Self::Provider(_))
    }
}

/// Map an upstream HTTP status to an [`AdapterError`] category, per the
/// gateway's fixed error taxonomy. `body` is included in the message for
/// diagnostics.
#[must_use]
pub fn classify_status(status: u16, body: &str) -> AdapterError {
    match status {
        401 | 403 => AdapterError::Auth(format!("HTTP {status}: {body}")),
        400 => AdapterError::Validation(format!("HTTP {status}: {body}")),
        429 => AdapterError::RateLimit(format!("HTTP {status}: {body}")),
        s if (500..600).contains(&s) => AdapterError::Provider(format!("HTTP {status}: {body}")),
        s => AdapterError::Provider(format!("HTTP {s}: {body}")),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_statuses() {
        assert!(matches!(classify_status(401, ""), AdapterError::Auth(_)));
        assert!(matches!(classify_status(403, ""), AdapterError::Auth(_)));
        assert!(matches!(classify_status(400, ""), AdapterError::Validation(_)));
        assert!(matches!(classify_status(429, ""), AdapterError::RateLimit(_)));
        assert!(matches!(classify_status(500, ""), AdapterError::Provider(_)));
        assert!(matches!(classify_status(503, ""), AdapterError::Provider(_)));
    }

    #[test]
    fn only_rate_limit_and_provider_are_pipeline_retryable() {
        assert!(classify_status(429, "").retryable_by_pipeline());
        assert!(classify_status(503, "").retryable_by_pipeline());
        assert!(!classify_status(401, "").retryable_by_pipeline());
        assert!(!classify_status(400, "").retryable_by_pipeline());
        assert!(!AdapterError::Content("filtered".into()).retryable_by_pipeline());
    }
}
