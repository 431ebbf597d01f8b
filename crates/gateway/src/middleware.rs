//! HTTP middleware stack. Layer order (outermost to innermost for requests):
//!
//! 1. `CatchPanicLayer` — converts handler panics to 500s
//! 2. `SetSensitiveHeadersLayer` — marks Authorization/Cookie as redacted in logs
//! 3. `SetRequestIdLayer` — generates x-request-id before tracing
//! 4. `TraceLayer` — logs requests with redacted headers + request ID
//! 5. `CorsLayer` — handles preflight
//! 6. `PropagateRequestIdLayer` — copies x-request-id to the response
//! 7. Security response headers — X-Content-Type-Options, X-Frame-Options, Referrer-Policy
//! 8. `RequestBodyLimitLayer` — rejects oversized bodies
//! 9. `CompressionLayer` (innermost) — compresses response body

use axum::{
    Router,
    http::{HeaderValue, header},
};
use ig_providers::MAX_REQUEST_BODY_BYTES;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    sensitive_headers::SetSensitiveHeadersLayer,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

fn cors_layer() -> CorsLayer {
    CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
}

/// Wrap `router` with the full middleware stack.
pub fn apply_middleware_stack<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let router = router
        .layer(CompressionLayer::new())
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .layer(SetResponseHeaderLayer::overriding(
            header::HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("deny"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http());

    router
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(SetSensitiveHeadersLayer::new([
            header::AUTHORIZATION,
            header::COOKIE,
            header::SET_COOKIE,
        ]))
        .layer(CatchPanicLayer::new())
}
