//! HTTP error mapping
//!
//! Every workflow failure reaches the client as a status code plus
//! `{"error": {"code", "message", ...}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use warga_common::{AuthError, Error};

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or unconfirmed request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Workflow failure, mapped by kind
    #[error(transparent)]
    Common(#[from] Error),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Common(Error::Auth(err))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Common(err) => match err {
                Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                Error::NotFound(_) => StatusCode::NOT_FOUND,
                Error::Guard(_) => StatusCode::CONFLICT,
                Error::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
                Error::Auth(auth) => auth_status(auth),
                Error::Decode(_) => StatusCode::BAD_REQUEST,
                Error::Config(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

fn auth_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidCredential
        | AuthError::NotSignedIn
        | AuthError::RequiresRecentLogin => StatusCode::UNAUTHORIZED,
        AuthError::UnauthorizedDomain | AuthError::WrongPassword => StatusCode::FORBIDDEN,
        AuthError::EmailAlreadyInUse => StatusCode::CONFLICT,
        AuthError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            ApiError::BadRequest(msg) => json!({
                "error": { "code": "BAD_REQUEST", "message": msg }
            }),
            ApiError::Common(Error::Validation(errors)) => json!({
                "error": {
                    "code": "VALIDATION_ERROR",
                    "message": "Periksa kembali isian formulir.",
                    "fields": errors.errors,
                }
            }),
            ApiError::Common(Error::Auth(auth)) => json!({
                "error": { "code": auth.code(), "message": auth.user_message() }
            }),
            ApiError::Common(err) => json!({
                "error": { "code": err.kind(), "message": err.to_string() }
            }),
        };

        if status.is_server_error() {
            error!(status = %status, error = %self, "Request failed");
        } else {
            warn!(status = %status, error = %self, "Request rejected");
        }

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use warga_common::ValidationErrors;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (Error::Guard("x".into()), StatusCode::CONFLICT),
            (Error::Store("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (Error::Decode("x".into()), StatusCode::BAD_REQUEST),
            (
                Error::Validation(ValidationErrors::single("nik", "x")),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (Error::Auth(AuthError::EmailAlreadyInUse), StatusCode::CONFLICT),
            (Error::Auth(AuthError::UnauthorizedDomain), StatusCode::FORBIDDEN),
            (Error::Auth(AuthError::NotSignedIn), StatusCode::UNAUTHORIZED),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }
}
