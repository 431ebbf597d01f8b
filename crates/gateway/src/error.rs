//! Converts the shared [`GatewayError`] into an HTTP response. This can't
//! live in `ig-common` — neither `GatewayError` nor `axum::IntoResponse` is
//! local to that crate, so the orphan rule blocks the impl there.

use axum::{Json, http::StatusCode, response::IntoResponse};
use ig_common::GatewayError;
use ig_protocol::{ErrorBody, ErrorShape};

pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error: ErrorShape::new(self.0.code(), self.0.to_string()).retryable(self.0.retryable()),
        };
        (status, Json(body)).into_response()
    }
}
