// SPDX-License-Identifier: MIT OR Apache-2.0
//! Maps [`MuseError`] onto HTTP responses.
//!
//! A single exhaustive table (`MuseError::http_status`, in `muse-error`)
//! decides the status code; this module only shapes the JSON body and
//! wires it into Axum's [`IntoResponse`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use muse_error::{ErrorCode, MuseError, MuseErrorDto};
use serde_json::json;

/// Newtype so `muse-daemon` handlers can return `Result<_, ApiError>` and
/// have Axum turn the error case into a JSON body automatically.
pub struct ApiError(pub MuseError);

impl From<MuseError> for ApiError {
    fn from(err: MuseError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let dto = MuseErrorDto::from(&self.0);

        if self.0.code == ErrorCode::Internal {
            tracing::error!(code = %self.0.code, message = %self.0.message, "internal error");
        }

        (status, Json(json!({ "code": dto.code, "message": dto.message, "details": dto.context })))
            .into_response()
    }
}

/// Shorthand for `Result<T, ApiError>` used throughout the route handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_map_to_500() {
        let err = ApiError(MuseError::new(ErrorCode::Internal, "boom"));
        assert_eq!(err.0.http_status(), 500);
    }

    #[test]
    fn baseline_mismatch_maps_to_409() {
        let err = ApiError(MuseError::new(ErrorCode::BaselineMismatch, "stale"));
        assert_eq!(err.0.http_status(), 409);
    }
}
