//! API error responses.

use alchemy_core::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::validation::ValidationError;

/// Errors returned by the progress endpoints.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The user id header failed validation.
    #[error("invalid user id: {0}")]
    InvalidUser(#[from] ValidationError),
    /// The user id header was not valid UTF-8.
    #[error("user id header is not valid text")]
    UnreadableUser,
    /// Storage failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidUser(_) | Self::UnreadableUser => StatusCode::BAD_REQUEST,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON body of an error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{self}");
        } else {
            tracing::debug!("Rejecting request: {self}");
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::InvalidUser(ValidationError::UserIdInvalidChars).status(),
            StatusCode::BAD_REQUEST
        );
        let io = std::io::Error::other("disk full");
        assert_eq!(
            ApiError::Store(StoreError::Io(io)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_into_response_status() {
        let response = ApiError::UnreadableUser.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
