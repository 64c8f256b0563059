//! Loan application HTTP handlers.
//!
//! This module implements the application workflow endpoints:
//! - POST /api/v1/applications - Submit an application (borrower)
//! - GET /api/v1/applications - List applications
//! - GET /api/v1/applications/{id} - Get application details
//! - POST /api/v1/applications/{id}/review - Record a review decision (staff)
//! - POST /api/v1/applications/{id}/cancel - Cancel an open application
//! - POST /api/v1/applications/{id}/fund - Fund an approved application (staff)

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
        application::{
            ApplicationStatus, FundLoanRequest, LoanApplication, ReviewApplicationRequest,
            SubmitApplicationRequest,
        },
        loan::LoanResponse,
        pagination::{ListQuery, PageResponse},
    },
    services::{application_service, loan_service},
};

/// Submit an application for the caller's own profile.
///
/// # Request Body
///
/// ```json
/// {
///   "requested_amount": "1000.00",
///   "terms_weeks": 12,
///   "documents": { "driver_license_url": "https://files.example.com/dl.jpg" },
///   "profile": { "phone_number": "021 555 0192" }
/// }
/// ```
///
/// # Response (201)
///
/// ```json
/// {
///   "id": "660e8400-...",
///   "requested_amount_cents": 100000,
///   "interest_rate_percent": "40",
///   "terms_weeks": 12,
///   "weekly_payment_cents": 11667,
///   "status": "submitted"
/// }
/// ```
pub async fn submit_application(
    State(pool): State<DbPool>,
    State(settings): State<Arc<LoanSettings>>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<SubmitApplicationRequest>,
) -> Result<(StatusCode, Json<LoanApplication>), AppError> {
    let profile_id = auth.own_profile()?;

    let application =
        application_service::submit_application(&pool, &settings, profile_id, request).await?;

    Ok((StatusCode::CREATED, Json(application)))
}

/// List applications, newest first.
///
/// # Endpoint
///
/// `GET /api/v1/applications?status=submitted&page=1&per_page=20`
///
/// Staff see every application; borrowers see their own.
pub async fn list_applications(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListQuery<ApplicationStatus>>,
) -> Result<Json<PageResponse<LoanApplication>>, AppError> {
    let visible_profile = auth.visible_profile()?;

    let page = application_service::list_applications(&pool, visible_profile, &query).await?;

    Ok(Json(page))
}

pub async fn get_application(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(application_id): Path<Uuid>,
) -> Result<Json<LoanApplication>, AppError> {
    let visible_profile = auth.visible_profile()?;

    let application =
        application_service::get_application(&pool, visible_profile, application_id).await?;

    Ok(Json(application))
}

/// Record a review decision.
///
/// # Request Body
///
/// ```json
/// { "status": "rejected", "rejection_reason": "Licence expired" }
/// ```
///
/// # Errors
///
/// - 409: application already funded or cancelled
pub async fn review_application(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(application_id): Path<Uuid>,
    Json(request): Json<ReviewApplicationRequest>,
) -> Result<Json<LoanApplication>, AppError> {
    auth.require_staff()?;

    let application =
        application_service::review_application(&pool, auth.api_key_id, application_id, request)
            .await?;

    Ok(Json(application))
}

/// Cancel an application that is submitted, pending or approved.
pub async fn cancel_application(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(application_id): Path<Uuid>,
) -> Result<Json<LoanApplication>, AppError> {
    let application =
        application_service::cancel_application(&pool, &auth, application_id).await?;

    Ok(Json(application))
}

/// Fund an approved application, creating its loan.
///
/// # Request Body
///
/// ```json
/// { "start_date": "2025-03-03", "signed_date": "2025-03-01", "paid_by": "bank transfer" }
/// ```
///
/// All fields are optional; `start_date` defaults to today.
///
/// # Response (201)
///
/// The new loan, with the full total outstanding.
pub async fn fund_application(
    State(pool): State<DbPool>,
    State(settings): State<Arc<LoanSettings>>,
    Extension(auth): Extension<AuthContext>,
    Path(application_id): Path<Uuid>,
    Json(request): Json<FundLoanRequest>,
) -> Result<(StatusCode, Json<LoanResponse>), AppError> {
    auth.require_staff()?;

    let loan = loan_service::fund_loan(&pool, &settings, application_id, request).await?;

    Ok((StatusCode::CREATED, Json(loan.into())))
}
