//! Router assembly and the `run` entrypoint.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;

use crate::{middleware::apply_middleware_stack, routes, state::AppState};

/// Assemble the full axum `Router`: routes plus the full middleware stack.
#[must_use]
pub fn build_router(state: Arc<AppState>) -> axum::Router {
    apply_middleware_stack(routes::router(state))
}

/// Bind `addr` and serve until the process is signalled to stop.
pub async fn run(addr: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "inference gateway listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("server loop exited with an error")?;
    Ok(())
}
