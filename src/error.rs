use actix_web::http::StatusCode;
use actix_web::http::header::ContentType;
use actix_web::{HttpResponse, ResponseError};
use std::fmt;

use crate::auth::IdentityError;
use crate::completion::CompletionError;

/// Request-terminating errors for the chat endpoint.
///
/// Each variant maps to a fixed status code and a fixed plain-text body;
/// internal details are logged, never leaked to the caller.
#[derive(Debug)]
pub enum ApiError {
    /// The request body was not valid JSON.
    MalformedBody(serde_json::Error),
    /// The body parsed but `messages` was missing, not an array, or empty.
    InvalidPayload,
    /// Identity resolution found no user for the session.
    Unauthenticated,
    /// The identity provider itself failed.
    AuthProvider(IdentityError),
    /// The upstream completion call failed before streaming began.
    Upstream(CompletionError),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::MalformedBody(err) => write!(f, "malformed request body: {err}"),
            ApiError::InvalidPayload => write!(f, "\"messages\" must be a non-empty array"),
            ApiError::Unauthenticated => write!(f, "no authenticated user for session"),
            ApiError::AuthProvider(err) => write!(f, "identity provider error: {err}"),
            ApiError::Upstream(err) => write!(f, "completion service error: {err}"),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MalformedBody(_) | ApiError::InvalidPayload => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::AuthProvider(_) | ApiError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::MalformedBody(_) => "Bad Request: Invalid JSON",
            ApiError::InvalidPayload => "Bad Request: \"messages\" must be a non-empty array",
            ApiError::Unauthenticated => "Unauthorized",
            ApiError::AuthProvider(_) => "Internal Server Error",
            ApiError::Upstream(_) => "Internal Server Error: OpenAI API failed",
        };

        HttpResponse::build(self.status_code())
            .insert_header(ContentType::plaintext())
            .body(body)
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        ApiError::AuthProvider(err)
    }
}

impl From<CompletionError> for ApiError {
    fn from(err: CompletionError) -> Self {
        ApiError::Upstream(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let bad_json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(
            ApiError::MalformedBody(bad_json).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::InvalidPayload.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthenticated.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::AuthProvider(IdentityError::Provider("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Upstream(CompletionError::Invocation("down".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_provider_detail_not_in_response_body() {
        let err = ApiError::AuthProvider(IdentityError::Provider("secret backend detail".into()));
        let response = err.error_response();
        let body =
            futures::executor::block_on(actix_web::body::to_bytes(response.into_body())).unwrap();
        assert_eq!(body, "Internal Server Error");
    }
}
