//! HTTP error shape and the mapping from core errors to status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::common::auth::{AuthError, DenyReason};
use crate::domains::audit::AuditError;
use crate::domains::roles::RoleError;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenyReason>,
}

/// Structured API error returned by handlers.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code: code.to_string(),
                message: message.into(),
                reason: None,
            },
        }
    }

    pub fn unauthenticated() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthenticated", "Authentication required")
    }

    pub fn forbidden(reason: DenyReason) -> Self {
        let mut err = Self::new(StatusCode::FORBIDDEN, "forbidden", "Permission denied");
        err.body.reason = Some(reason);
        err
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "validation_error", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    /// Storage unreachable or slow. Details stay in the server log.
    pub fn unavailable(err: &dyn std::error::Error) -> Self {
        error!(error = %err, "Storage unavailable");
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "unavailable",
            "Storage temporarily unavailable",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<AuditError> for ApiError {
    fn from(err: AuditError) -> Self {
        match &err {
            AuditError::InvalidEntry(_) | AuditError::InvalidPage(_) => {
                ApiError::validation(err.to_string())
            }
            AuditError::Persistence(_) | AuditError::Timeout(_) => ApiError::unavailable(&err),
        }
    }
}

impl From<RoleError> for ApiError {
    fn from(err: RoleError) -> Self {
        if let Some(reason) = err.decision().and_then(|d| d.deny_reason()) {
            return ApiError::forbidden(reason);
        }
        match err {
            RoleError::NotFound(_) => ApiError::not_found(err.to_string()),
            RoleError::Audit(audit) => audit.into(),
            e if e.is_validation() => ApiError::validation(e.to_string()),
            e => ApiError::unavailable(&e),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::AuthenticationRequired => ApiError::unauthenticated(),
            AuthError::Denied(reason) => ApiError::forbidden(reason),
            AuthError::Role(e) => e.into(),
            AuthError::Audit(e) => e.into(),
        }
    }
}
