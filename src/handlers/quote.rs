//! Loan quote endpoint.
//!
//! The preview shown on the application form before anything is submitted.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    config::LoanSettings,
    error::AppError,
    services::amortization::{compute_loan_terms, to_cents},
};

/// Query string for `GET /api/v1/quote`.
#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub amount: Decimal,
    pub terms_weeks: u32,

    /// Defaults to the configured rate
    pub rate: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub principal_cents: i64,
    pub interest_rate_percent: Decimal,
    pub interest_cents: i64,
    pub total_payable_cents: i64,
    pub installment_cents: i64,
    pub terms_weeks: u32,

    /// Same amounts as 2 decimal place strings, for display
    pub total_payable: Decimal,
    pub installment: Decimal,
}

/// Quote a loan.
///
/// # Endpoint
///
/// `GET /api/v1/quote?amount=1000&terms_weeks=12`
///
/// # Response (200)
///
/// ```json
/// {
///   "principal_cents": 100000,
///   "interest_rate_percent": "40",
///   "interest_cents": 40000,
///   "total_payable_cents": 140000,
///   "installment_cents": 11667,
///   "terms_weeks": 12,
///   "total_payable": "1400.00",
///   "installment": "116.67"
/// }
/// ```
///
/// # Errors
///
/// - 400: amount not positive, term not offered, negative rate
/// - 422: amount or rate too large to compute in cents
pub async fn get_quote(
    State(settings): State<Arc<LoanSettings>>,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<QuoteResponse>, AppError> {
    if to_cents(query.amount)? <= 0 {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }
    if !settings.is_allowed_term(query.terms_weeks) {
        return Err(AppError::InvalidRequest(format!(
            "terms_weeks must be one of {:?}",
            settings.allowed_terms_weeks
        )));
    }

    let rate = query.rate.unwrap_or(settings.default_interest_rate_percent);
    if rate < Decimal::ZERO {
        return Err(AppError::InvalidRequest(
            "Rate cannot be negative".to_string(),
        ));
    }

    let terms = compute_loan_terms(query.amount, rate, query.terms_weeks)?;

    Ok(Json(QuoteResponse {
        principal_cents: terms.principal_cents,
        interest_rate_percent: rate,
        interest_cents: terms.interest_cents,
        total_payable_cents: terms.total_payable_cents,
        installment_cents: terms.installment_cents,
        terms_weeks: terms.term_count,
        total_payable: terms.total_payable(),
        installment: terms.installment(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        routing::get,
    };
    use rstest::rstest;
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/api/v1/quote", get(get_quote))
            .with_state(Arc::new(LoanSettings::default()))
    }

    async fn call(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    #[tokio::test]
    async fn test_quote_at_default_rate() {
        let (status, body) = call("/api/v1/quote?amount=1000&terms_weeks=12").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_payable_cents"], 140_000);
        assert_eq!(body["installment_cents"], 11_667);
        assert_eq!(body["total_payable"], "1400.00");
        assert_eq!(body["installment"], "116.67");
    }

    #[tokio::test]
    async fn test_quote_with_explicit_rate() {
        let (status, body) = call("/api/v1/quote?amount=500&terms_weeks=8&rate=0").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["interest_cents"], 0);
        assert_eq!(body["installment_cents"], 6_250);
    }

    #[tokio::test]
    async fn test_quote_overflow_is_unprocessable() {
        let (status, body) =
            call("/api/v1/quote?amount=1000&terms_weeks=12&rate=79228162514264337593543950335").await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "invalid_loan_terms");
    }

    #[rstest]
    #[case("/api/v1/quote?amount=1000&terms_weeks=13")]
    #[case("/api/v1/quote?amount=0&terms_weeks=12")]
    #[case("/api/v1/quote?amount=-5&terms_weeks=12")]
    #[case("/api/v1/quote?amount=1000&terms_weeks=12&rate=-1")]
    #[tokio::test]
    async fn test_quote_rejects_bad_input(#[case] uri: &str) {
        let (status, body) = call(uri).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "invalid_request");
    }
}
