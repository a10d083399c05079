use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use sl_domain::error::Error;

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Domain error on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InvalidName(_) | Error::MissingField(_) => StatusCode::BAD_REQUEST,
        Error::AlreadyOpen(_) => StatusCode::CONFLICT,
        Error::NotOpen(_) => StatusCode::NOT_FOUND,
        Error::DeviceUnavailable { .. }
        | Error::Close { .. }
        | Error::Io(_)
        | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, status = status.as_u16(), "request rejected");
        }
        api_error(status, self.0.to_string())
    }
}
