//! HTTP-facing errors. Every variant renders as a `{detail, ...}` JSON body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::validation::FieldErrors;

pub const NO_CREDENTIALS: &str = "Authentication credentials were not provided.";
pub const INVALID_TOKEN: &str = "Given token not valid for any token type.";
const INTERNAL_DETAIL: &str = "An unexpected error occurred.";

/// Error body: a human-readable `detail`, plus field errors or an upstream
/// error message where there is one.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{detail}: {errors}")]
    Validation { detail: String, errors: FieldErrors },

    /// A failure reported about, or by, an external service.
    #[error("{detail}")]
    Upstream {
        status: StatusCode,
        detail: String,
        errors: Option<Value>,
        error: Option<String>,
    },

    #[error("{0}")]
    Unauthorized(&'static str),

    /// Logged in full, reported to the client without internals.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(detail: impl Into<String>, errors: FieldErrors) -> Self {
        ApiError::Validation {
            detail: detail.into(),
            errors,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Upstream { status, .. } => *status,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::NotFound(detail) => ErrorEnvelope {
                detail,
                errors: None,
                error: None,
            },
            ApiError::Validation { detail, errors } => ErrorEnvelope {
                detail,
                errors: serde_json::to_value(errors).ok(),
                error: None,
            },
            ApiError::Upstream {
                detail,
                errors,
                error,
                ..
            } => ErrorEnvelope {
                detail,
                errors,
                error,
            },
            ApiError::Unauthorized(detail) => ErrorEnvelope {
                detail: detail.to_string(),
                errors: None,
                error: None,
            },
            ApiError::Internal(message) => {
                tracing::error!("Internal error: {}", message);
                ErrorEnvelope {
                    detail: INTERNAL_DETAIL.to_string(),
                    errors: None,
                    error: None,
                }
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(err: ApiError) -> (StatusCode, Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_renders_field_errors() {
        let err = ApiError::validation(
            "Failed to create tag. Please review the input data.",
            FieldErrors::single("name", "This field is required."),
        );
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["name"][0], "This field is required.");
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_internal_hides_message() {
        let (status, body) = body_of(ApiError::Internal("pool timed out".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], INTERNAL_DETAIL);
        assert!(!body.to_string().contains("pool"));
    }

    #[tokio::test]
    async fn test_unauthorized_detail() {
        let (status, body) = body_of(ApiError::Unauthorized(NO_CREDENTIALS)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], NO_CREDENTIALS);
    }
}
