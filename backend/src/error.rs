//! Error handling for the GreenLeaf storefront
//!
//! Every failure leaves the server as `{"error": {"code", "message", "field"}}`
//! with the status code the storefront UI branches on.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Request errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Insufficient inventory: {0}")]
    InsufficientInventory(String),

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    // External service errors
    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a field-level validation failure
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::TokenExpired | AppError::InvalidToken | AppError::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AppError::Validation { .. }
            | AppError::BadRequest(_)
            | AppError::InvalidSignature(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateEntry(_)
            | AppError::Conflict(_)
            | AppError::InvalidStateTransition(_)
            | AppError::InsufficientInventory(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PaymentGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Configuration(_)
            | AppError::DatabaseError(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> ErrorDetail {
        let (code, message, field) = match self {
            AppError::TokenExpired => ("TOKEN_EXPIRED", "Token has expired".to_string(), None),
            AppError::InvalidToken => ("INVALID_TOKEN", "Invalid token".to_string(), None),
            AppError::InsufficientPermissions => (
                "FORBIDDEN",
                "You do not have permission to perform this action".to_string(),
                None,
            ),
            AppError::Unauthorized(msg) => ("UNAUTHORIZED", msg.clone(), None),
            AppError::Validation { field, message } => {
                ("VALIDATION_ERROR", message.clone(), Some(field.clone()))
            }
            AppError::BadRequest(msg) => ("BAD_REQUEST", msg.clone(), None),
            AppError::DuplicateEntry(field) => (
                "CONFLICT",
                format!("A record with this {} already exists", field),
                Some(field.clone()),
            ),
            AppError::Conflict(msg) => ("CONFLICT", msg.clone(), None),
            AppError::NotFound(resource) => ("NOT_FOUND", format!("{} not found", resource), None),
            AppError::InvalidStateTransition(msg) => {
                ("INVALID_STATE_TRANSITION", msg.clone(), None)
            }
            AppError::InsufficientInventory(msg) => ("INSUFFICIENT_INVENTORY", msg.clone(), None),
            AppError::InvalidSignature(_) => (
                "INVALID_SIGNATURE",
                "Webhook signature verification failed".to_string(),
                None,
            ),
            AppError::PaymentGateway(_) => (
                "PAYMENT_GATEWAY_ERROR",
                "The payment provider could not process the request".to_string(),
                None,
            ),
            AppError::Configuration(_) => (
                "CONFIGURATION_ERROR",
                "The server is misconfigured".to_string(),
                None,
            ),
            AppError::DatabaseError(_) => (
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
                None,
            ),
            AppError::Internal(_) | AppError::InternalError(_) => (
                "INTERNAL_ERROR",
                "An internal server error occurred".to_string(),
                None,
            ),
        };

        ErrorDetail {
            code: code.to_string(),
            message,
            field,
        }
    }
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: self.detail() })).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let (field, message) = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("{} is invalid", field));
                (field.to_string(), message)
            })
            .unwrap_or_else(|| ("body".to_string(), "Invalid request body".to_string()));

        AppError::Validation { field, message }
    }
}

/// Map a unique-constraint violation to `DuplicateEntry`, pass everything else through
pub fn map_unique_violation(err: sqlx::Error, field: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::DuplicateEntry(field.to_string())
        }
        _ => AppError::DatabaseError(err),
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_map_to_statuses() {
        assert_eq!(
            AppError::NotFound("Strain".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::BadRequest("empty cart".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::InsufficientInventory("only 2 left".into()).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn internal_details_are_not_leaked() {
        let detail = AppError::Internal("connection string postgres://secret".into()).detail();
        assert!(!detail.message.contains("secret"));
    }

    #[test]
    fn validation_carries_field() {
        let detail = AppError::validation("quantity", "Quantity must be at least 1").detail();
        assert_eq!(detail.code, "VALIDATION_ERROR");
        assert_eq!(detail.field.as_deref(), Some("quantity"));
    }
}
