//! `/health/liveness` and `/health/readiness` probes.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode};
use ig_health::HealthState;
use ig_kvstore::KVStore;

use crate::state::AppState;

pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Ready when the KVStore backing health/quota is reachable and at least one
/// configured, enabled provider's breaker is `Closed`.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.kv.exists("health:readiness-probe").await.is_err() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    let config = state.config.load();
    let any_closed = config
        .providers
        .values()
        .filter(|p| p.enabled)
        .any(|p| state.health.state_of(&p.key) != HealthState::Open);

    if any_closed {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
