// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error types for the intake service.

use crate::identity::IdentityError;
use crate::moderation::ValidationError;
use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Why a submission did not reach a terminal moderation outcome.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("{0}")]
    Invalid(#[from] ValidationError),

    #[error("Storage unavailable: {0}")]
    Persistence(#[from] StoreError),
}

impl SubmitError {
    /// Outcome label used in metrics and response bodies.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "invalid",
            Self::Persistence(_) => "error",
        }
    }
}

/// HTTP-edge error.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Invalid(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Invalid(e) => ApiError::Invalid(e.to_string()),
            SubmitError::Persistence(e) => ApiError::Store(e),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, Option<bool>) {
        match self {
            ApiError::Invalid(_) => (StatusCode::BAD_REQUEST, "invalid", None),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", None),
            ApiError::Identity(
                IdentityError::MissingKey
                | IdentityError::InvalidKey(_)
                | IdentityError::EncryptionFailed,
            ) => (StatusCode::INTERNAL_SERVER_ERROR, "error", None),
            ApiError::Identity(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_token", None),
            ApiError::Store(e) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "error",
                Some(e.is_retryable()),
            ),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "error", None),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, status, retryable) = self.parts();
        (
            code,
            Json(ErrorResponse {
                status,
                reason: self.to_string(),
                retryable,
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
            ApiError::from(SubmitError::Invalid(ValidationError::Empty)).parts().0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(SubmitError::Persistence(StoreError::Timeout)).parts(),
            (StatusCode::SERVICE_UNAVAILABLE, "error", Some(true))
        );
        assert_eq!(
            ApiError::Identity(IdentityError::DecryptionFailed).parts().0,
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::NotFound("tip 1".to_string()).parts().0,
            StatusCode::NOT_FOUND
        );
    }
}
