//! Metric name and label constants. Centralizing these keeps every call site
//! consistent and makes it obvious what a `/metrics` scrape exposes.

pub mod http {
    pub const REQUESTS_TOTAL: &str = "ig_http_requests_total";
    pub const REQUEST_DURATION_SECONDS: &str = "ig_http_request_duration_seconds";
    pub const REQUESTS_IN_FLIGHT: &str = "ig_http_requests_in_flight";
}

/// Per-candidate-attempt metrics, emitted once per upstream call the
/// pipeline makes (not once per client request — a single request may
/// attempt several candidates on fallback).
pub mod upstream {
    pub const ATTEMPTS_TOTAL: &str = "ig_upstream_attempts_total";
    pub const ATTEMPT_DURATION_SECONDS: &str = "ig_upstream_attempt_duration_seconds";
    pub const ATTEMPT_ERRORS_TOTAL: &str = "ig_upstream_attempt_errors_total";
    pub const TIME_TO_FIRST_TOKEN_SECONDS: &str = "ig_upstream_time_to_first_token_seconds";
    pub const INPUT_TOKENS_TOTAL: &str = "ig_upstream_input_tokens_total";
    pub const OUTPUT_TOKENS_TOTAL: &str = "ig_upstream_output_tokens_total";
}

/// Per-provider resilience state, scraped as gauges rather than counters —
/// Prometheus can graph state transitions over time from point-in-time reads.
pub mod provider {
    pub const CIRCUIT_STATE: &str = "ig_provider_circuit_state";
    pub const CIRCUIT_OPENED_TOTAL: &str = "ig_provider_circuit_opened_total";
    pub const QUOTA_RPM_REMAINING: &str = "ig_provider_quota_rpm_remaining";
    pub const QUOTA_TPM_REMAINING: &str = "ig_provider_quota_tpm_remaining";
}

pub mod router {
    pub const RANK_REQUESTS_TOTAL: &str = "ig_router_rank_requests_total";
    pub const DEGRADED_FALLBACKS_TOTAL: &str = "ig_router_degraded_fallbacks_total";
    pub const CANDIDATES_CONSIDERED: &str = "ig_router_candidates_considered";
}

pub mod labels {
    pub const METHOD: &str = "method";
    pub const PATH: &str = "path";
    pub const STATUS: &str = "status";
    pub const PROVIDER_KEY: &str = "provider_key";
    pub const CANONICAL_ID: &str = "canonical_id";
    pub const ERROR_CODE: &str = "error_code";
}

/// Standard histogram buckets, reused across metric registrations so
/// Prometheus queries stay comparable across metric names.
pub mod buckets {
    use once_cell::sync::Lazy;

    /// HTTP request duration (seconds). Covers 1ms to 60s.
    pub static HTTP_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ]
    });

    /// Upstream provider call duration (seconds). Covers 100ms to 5 minutes —
    /// LLM completions can be slow, especially without streaming.
    pub static UPSTREAM_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0, 60.0, 120.0, 180.0, 300.0,
        ]
    });

    /// Time to first streamed token (seconds). Covers 10ms to 30s.
    pub static TTFT: Lazy<Vec<f64>> =
        Lazy::new(|| vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0]);
}
