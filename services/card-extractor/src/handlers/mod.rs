//! HTTP handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use cardex_utils::{CardexError, ErrorResponse};

pub mod batch;
pub mod health;

pub use batch::*;
pub use health::*;

/// Maps a [`CardexError`] onto its HTTP status and JSON error body.
#[derive(Debug)]
pub struct ApiError(pub CardexError);

impl From<CardexError> for ApiError {
    fn from(error: CardexError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse::from(self.0))).into_response()
    }
}
