//! Error types for the beacon service
//!
//! The signal-stabilization core reports failure through `bool` and `Option`
//! results; these errors cover configuration and the host-facing HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Beacon Error Enum ==
/// Unified error type for configuration and the debug API.
#[derive(Error, Debug)]
pub enum BeaconError {
    /// A configuration value was rejected at assignment
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No live beacon with the given identity
    #[error("Beacon not found: {0}")]
    NotFound(String),

    /// Export or import payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for BeaconError {
    fn into_response(self) -> Response {
        let status = match &self {
            BeaconError::InvalidConfig(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BeaconError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            BeaconError::NotFound(_) => StatusCode::NOT_FOUND,
            BeaconError::Serialization(_) => StatusCode::BAD_REQUEST,
            BeaconError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the beacon service.
pub type Result<T> = std::result::Result<T, BeaconError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (BeaconError::InvalidConfig("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (BeaconError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (BeaconError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (BeaconError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_serialization_error_converts() {
        let parse_error = serde_json::from_str::<u32>("not json").unwrap_err();
        let error: BeaconError = parse_error.into();

        assert!(matches!(error, BeaconError::Serialization(_)));
        assert!(error.to_string().starts_with("Serialization error"));
    }
}
