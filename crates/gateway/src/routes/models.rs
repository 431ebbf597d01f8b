//! `GET /v1/models` — enumerate the canonical models this gateway can route
//! to, with their capability flags, OpenAI-`models`-endpoint-shaped.

use std::sync::Arc;

use axum::{Json, extract::State};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: &'static str,
    pub owned_by: String,
    pub capabilities: ig_config::Capabilities,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub object: &'static str,
    pub data: Vec<ModelEntry>,
}

pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    let config = state.config.load();
    let data = config
        .canonical_models
        .iter()
        .map(|m| ModelEntry {
            id: m.id.clone(),
            object: "model",
            owned_by: m.provider_key.clone(),
            capabilities: m.capabilities.clone(),
        })
        .collect();

    Json(ModelsResponse { object: "list", data })
}
