//! Loan and payment HTTP handlers.
//!
//! - GET /api/v1/loans - List loans
//! - GET /api/v1/loans/{id} - Get loan details with repayment progress
//! - GET /api/v1/loans/{id}/payments - Payments on one loan
//! - POST /api/v1/loans/{id}/payments - Record a repayment (staff)
//! - POST /api/v1/loans/{id}/default - Write a loan off (staff)
//! - GET /api/v1/payments - List payments
//! - GET /api/v1/payments/{id} - Get payment details

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    config::LoanSettings,
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        loan::{LoanResponse, LoanStatus},
        pagination::{ListQuery, PageQuery, PageResponse},
        payment::{PaymentResponse, RecordPaymentRequest},
    },
    services::loan_service,
};

/// List loans, newest first.
///
/// # Endpoint
///
/// `GET /api/v1/loans?status=active&page=1&per_page=20`
pub async fn list_loans(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListQuery<LoanStatus>>,
) -> Result<Json<PageResponse<LoanResponse>>, AppError> {
    let visible_profile = auth.visible_profile()?;

    let page = loan_service::list_loans(&pool, visible_profile, &query).await?;

    Ok(Json(page.map(LoanResponse::from)))
}

pub async fn get_loan(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<LoanResponse>, AppError> {
    let visible_profile = auth.visible_profile()?;

    let loan = loan_service::get_loan(&pool, visible_profile, loan_id).await?;

    Ok(Json(loan.into()))
}

/// Payments on one loan, oldest first.
pub async fn list_loan_payments(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<Vec<PaymentResponse>>, AppError> {
    let visible_profile = auth.visible_profile()?;

    let payments = loan_service::list_loan_payments(&pool, visible_profile, loan_id).await?;

    Ok(Json(payments.into_iter().map(PaymentResponse::from).collect()))
}

/// Record a repayment.
///
/// # Request Body
///
/// ```json
/// {
///   "amount": "116.67",
///   "payment_date": "2025-03-10",
///   "paid_by": "cash",
///   "idempotency_key": "loan-42-week-1"
/// }
/// ```
///
/// # Response (201)
///
/// ```json
/// {
///   "id": "880e8400-...",
///   "amount_cents": 11667,
///   "balance_before_cents": 140000,
///   "balance_after_cents": 128333,
///   "overpayment_cents": 0,
///   "payment_date": "2025-03-10"
/// }
/// ```
///
/// Repeating a request with the same `idempotency_key` returns the payment
/// recorded the first time, also with 201. Two first-time requests racing
/// with the same new key are not deduplicated: the one that loses hits the
/// unique constraint and gets a 500.
///
/// # Errors
///
/// - 404: loan not found
/// - 409: loan is completed or defaulted
pub async fn record_payment(
    State(pool): State<DbPool>,
    State(settings): State<Arc<LoanSettings>>,
    Extension(auth): Extension<AuthContext>,
    Path(loan_id): Path<Uuid>,
    Json(request): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), AppError> {
    auth.require_staff()?;

    let payment =
        loan_service::record_payment(&pool, &settings, auth.api_key_id, loan_id, request).await?;

    Ok((StatusCode::CREATED, Json(payment.into())))
}

/// Mark an active loan as defaulted.
pub async fn mark_defaulted(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<LoanResponse>, AppError> {
    auth.require_staff()?;

    let loan = loan_service::mark_defaulted(&pool, loan_id).await?;

    Ok(Json(loan.into()))
}

/// List payments across loans, latest first.
///
/// # Endpoint
///
/// `GET /api/v1/payments?page=1&per_page=50`
pub async fn list_payments(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PageResponse<PaymentResponse>>, AppError> {
    let visible_profile = auth.visible_profile()?;

    let page = loan_service::list_payments(&pool, visible_profile, &query).await?;

    Ok(Json(page.map(PaymentResponse::from)))
}

pub async fn get_payment(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<PaymentResponse>, AppError> {
    let visible_profile = auth.visible_profile()?;

    let payment = loan_service::get_payment(&pool, visible_profile, payment_id).await?;

    Ok(Json(payment.into()))
}
