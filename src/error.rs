//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::services::amortization::AmortizationError;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Database Errors**: Any sqlx::Error from database operations
/// - **Authentication Errors**: Invalid or missing API keys, wrong role
/// - **Resource Errors**: Requested resources not found
/// - **Workflow Errors**: Status transitions the loan workflow forbids
/// - **Validation Errors**: Invalid request data
/// - **Arithmetic Errors**: Loan math called with out-of-contract values
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// API key is missing, invalid, or inactive.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Authenticated, but the key's role may not perform this operation.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Operation not permitted for this API key")]
    Forbidden,

    /// Returns HTTP 404 Not Found.
    #[error("Profile not found")]
    ProfileNotFound,

    /// Application does not exist or is not visible to the caller.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Loan application not found")]
    ApplicationNotFound,

    /// Loan does not exist or is not visible to the caller.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Loan not found")]
    LoanNotFound,

    /// Returns HTTP 404 Not Found.
    #[error("Payment not found")]
    PaymentNotFound,

    /// Requested status change is not allowed from the current status.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("Cannot move from '{from}' to '{to}'")]
    InvalidStatusTransition { from: String, to: String },

    /// Payment or status change against a loan that is not active.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("Loan is not active")]
    LoanNotActive,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// Loan arithmetic rejected its inputs.
    ///
    /// Returns HTTP 422 Unprocessable Entity.
    #[error("Invalid loan terms: {0}")]
    LoanArithmetic(#[from] AmortizationError),
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::InvalidApiKey => (
                StatusCode::UNAUTHORIZED,
                "invalid_api_key",
                self.to_string(),
            ),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden", self.to_string()),
            AppError::ProfileNotFound => {
                (StatusCode::NOT_FOUND, "profile_not_found", self.to_string())
            }
            AppError::ApplicationNotFound => (
                StatusCode::NOT_FOUND,
                "application_not_found",
                self.to_string(),
            ),
            AppError::LoanNotFound => (StatusCode::NOT_FOUND, "loan_not_found", self.to_string()),
            AppError::PaymentNotFound => {
                (StatusCode::NOT_FOUND, "payment_not_found", self.to_string())
            }
            AppError::InvalidStatusTransition { .. } => (
                StatusCode::CONFLICT,
                "invalid_status_transition",
                self.to_string(),
            ),
            AppError::LoanNotActive => (StatusCode::CONFLICT, "loan_not_active", self.to_string()),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::LoanArithmetic(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_loan_terms",
                self.to_string(),
            ),
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[rstest]
    #[case(AppError::InvalidApiKey, StatusCode::UNAUTHORIZED, "invalid_api_key")]
    #[case(AppError::Forbidden, StatusCode::FORBIDDEN, "forbidden")]
    #[case(AppError::LoanNotFound, StatusCode::NOT_FOUND, "loan_not_found")]
    #[case(AppError::LoanNotActive, StatusCode::CONFLICT, "loan_not_active")]
    #[case(
        AppError::LoanArithmetic(AmortizationError::ZeroTermCount),
        StatusCode::UNPROCESSABLE_ENTITY,
        "invalid_loan_terms"
    )]
    #[case(
        AppError::Database(sqlx::Error::RowNotFound),
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error"
    )]
    #[tokio::test]
    async fn test_status_and_code(
        #[case] error: AppError,
        #[case] status: StatusCode,
        #[case] code: &str,
    ) {
        let response = error.into_response();
        assert_eq!(response.status(), status);
        assert_eq!(body_json(response).await["error"]["code"], code);
    }

    #[tokio::test]
    async fn test_invalid_request_carries_message() {
        let response = AppError::InvalidRequest("Amount must be positive".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"]["message"],
            "Amount must be positive"
        );
    }

    #[tokio::test]
    async fn test_database_details_hidden() {
        let response = AppError::Database(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(
            body_json(response).await["error"]["message"],
            "An internal error occurred"
        );
    }

    #[test]
    fn test_transition_message() {
        let error = AppError::InvalidStatusTransition {
            from: "funded".to_string(),
            to: "approved".to_string(),
        };
        assert_eq!(error.to_string(), "Cannot move from 'funded' to 'approved'");
    }
}
