use crate::db::errors::DbError;
use crate::types::{Operation, Permission};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided, or the credentials were rejected
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// User lacks the role or ownership required for the operation
    #[error("Insufficient permissions to {action} {resource}")]
    InsufficientPermissions {
        required: Permission,
        action: Operation,
        resource: String,
    },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// The payment gateway declined or did not complete a charge
    #[error("Payment failed: {message}")]
    PaymentFailed { message: String },

    /// Conflict error, e.g. subscribing twice to the same tier
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// A server-side integration the route needs is not configured
    #[error("{what} not configured")]
    NotConfigured { what: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest { message: message.into() }
    }

    pub fn not_found(resource: impl Into<String>, id: impl ToString) -> Self {
        Error::NotFound {
            resource: resource.into(),
            id: id.to_string(),
        }
    }

    /// Ownership and role failures share the 401 contract of missing credentials.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::InsufficientPermissions { .. } => StatusCode::UNAUTHORIZED,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::PaymentFailed { .. } => StatusCode::PAYMENT_REQUIRED,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::NotConfigured { .. } | Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Unauthorized".to_string()),
            Error::InsufficientPermissions { .. } => "Unauthorized".to_string(),
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, .. } => format!("{resource} not found"),
            Error::PaymentFailed { .. } => "Payment failed".to_string(),
            Error::Conflict { message } => message.clone(),
            Error::NotConfigured { what } => format!("{what} not configured"),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { constraint, table, .. } => match (table.as_deref(), constraint.as_deref()) {
                    (Some("users"), Some(c)) if c.contains("email") => "An account with this email address already exists".to_string(),
                    (Some("users"), Some(c)) if c.contains("username") => "This username is already taken".to_string(),
                    (Some("subscriptions"), _) => "Already subscribed to this tier".to_string(),
                    (Some("affiliate_links"), _) => "This affiliate code is already taken".to_string(),
                    (Some("transactions"), _) | (Some("brand_transactions"), _) => "Transaction already recorded".to_string(),
                    _ => "Resource already exists".to_string(),
                },
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
                DbError::Other(_) => "Internal server error".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::NotConfigured { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Unauthenticated { .. } | Error::InsufficientPermissions { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::PaymentFailed { .. } => {
                tracing::warn!("Payment error: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
            Error::Conflict { .. } => {
                tracing::warn!("Conflict error: {}", self);
            }
        }

        let status = self.status_code();
        (status, Json(json!({ "error": self.user_message() }))).into_response()
    }
}

/// Convert from String errors (e.g., from external functions)
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_failures_answer_unauthorized() {
        let err = Error::InsufficientPermissions {
            required: Permission::Granted,
            action: Operation::UpdateOwn,
            resource: "subscription tier".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.user_message(), "Unauthorized");
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = Error::Other(anyhow::anyhow!("connection refused to 10.0.0.3"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.user_message(), "Internal server error");

        let err = Error::Database(DbError::Other(anyhow::anyhow!("syntax error at or near")));
        assert_eq!(err.user_message(), "Internal server error");
    }

    #[test]
    fn unique_violations_are_conflicts() {
        let err = Error::Database(DbError::UniqueViolation {
            constraint: Some("subscriptions_active_unique".to_string()),
            table: Some("subscriptions".to_string()),
            message: "duplicate key value".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.user_message(), "Already subscribed to this tier");
    }

    #[test]
    fn declined_payments_are_payment_required() {
        let err = Error::PaymentFailed {
            message: "requires_action".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(err.user_message(), "Payment failed");
    }

    #[test]
    fn missing_integrations_are_server_errors() {
        let err = Error::NotConfigured {
            what: "Payment provider".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.user_message(), "Payment provider not configured");
    }

    #[tokio::test]
    async fn responses_carry_json_error_body() {
        let response = Error::bad_request("Amount and recipient are required").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({ "error": "Amount and recipient are required" }));
    }
}
