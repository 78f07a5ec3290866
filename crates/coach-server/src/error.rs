use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use coach_core::CoachError;

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
///
/// Bodies are fixed strings per status; the underlying error only reaches
/// the logs.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn unauthorized() -> Self {
        Self(CoachError::Unauthorized.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(CoachError::BadPayload(msg.into()).into())
    }

    fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<CoachError>() {
            Some(CoachError::Unauthorized) => StatusCode::UNAUTHORIZED,
            Some(CoachError::BadPayload(_) | CoachError::InvalidKey(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match status {
            StatusCode::UNAUTHORIZED => "unauthorized",
            StatusCode::BAD_REQUEST => "bad request",
            _ => {
                tracing::error!("request failed: {:#}", self.0);
                "internal error"
            }
        };
        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
