//! Mapping of failures onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use issuefields_core::{ErrorCollection, Reason};
use serde_json::json;
use tracing::error;

/// A failed request.
#[derive(Debug)]
pub enum AppError {
    /// Field validation failed; the reasons pick the status code.
    Validation(ErrorCollection),
    NotFound(String),
    /// The request named a user the site does not know.
    Unauthorized(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(errors) => status_for(errors),
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// The most severe reason wins.
fn status_for(errors: &ErrorCollection) -> StatusCode {
    let reasons = errors.reasons();
    if reasons.contains(&Reason::ServerError) {
        StatusCode::INTERNAL_SERVER_ERROR
    } else if reasons.contains(&Reason::NotFound) {
        StatusCode::NOT_FOUND
    } else if reasons.contains(&Reason::Forbidden) {
        StatusCode::FORBIDDEN
    } else {
        StatusCode::BAD_REQUEST
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Validation(errors) => json!({
                "errorMessages": errors.error_messages(),
                "errors": errors.errors(),
            }),
            Self::NotFound(message) | Self::Unauthorized(message) | Self::BadRequest(message) => {
                json!({ "errorMessages": [message], "errors": {} })
            }
            Self::Internal(e) => {
                error!(error = %e, "Request failed");
                json!({ "errorMessages": [e.to_string()], "errors": {} })
            }
        };
        (status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Internal(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_follows_reasons() {
        let mut errors = ErrorCollection::new();
        errors.add_error("summary", "Summary is required.");
        assert_eq!(AppError::Validation(errors.clone()).status(), StatusCode::BAD_REQUEST);

        errors.add_reason(Reason::Forbidden);
        assert_eq!(AppError::Validation(errors.clone()).status(), StatusCode::FORBIDDEN);

        errors.add_reason(Reason::NotFound);
        assert_eq!(AppError::Validation(errors).status(), StatusCode::NOT_FOUND);
    }
}
