use std::sync::Arc;

use axum::{extract::State, response::IntoResponse};
use http::{HeaderValue, header::CONTENT_TYPE};

use crate::state::AppState;

/// Serves the current Prometheus snapshot as `text/plain` scrape output.
pub async fn scrape(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state.metrics.render();
    let mut response = body.into_response();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; version=0.0.4"));
    response
}
