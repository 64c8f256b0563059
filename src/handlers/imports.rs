//! Bulk import HTTP handlers (staff only).
//!
//! - POST /api/v1/imports - Import clients and loans from parsed sheet rows
//! - DELETE /api/v1/imports - Remove everything a previous import created

use std::sync::Arc;

use axum::{Extension, Json, extract::State};

use crate::{
    config::LoanSettings,
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::import::{ImportReport, ImportRequest, PurgeReport},
    services::import_service,
};

/// Import clients and loans.
///
/// # Request Body
///
/// ```json
/// {
///   "mode": "all",
///   "clients": [{ "client_no": "C-001", "full_name": "Tama Ngata" }],
///   "loans": [{
///     "loan_no": "L-001", "client_no": "C-001", "client_name": "Tama Ngata",
///     "amount": 1000, "interests": 400, "total_amount": 1400, "terms_weeks": 12,
///     "start_date": "2024-01-08", "status": "Active",
///     "payments": [{ "date": "2024-01-15", "amount": 116.67 }]
///   }]
/// }
/// ```
///
/// Row failures are listed in the report; the response is 200 regardless.
pub async fn run_import(
    State(pool): State<DbPool>,
    State(settings): State<Arc<LoanSettings>>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<ImportRequest>,
) -> Result<Json<ImportReport>, AppError> {
    auth.require_staff()?;

    tracing::info!(
        api_key_id = %auth.api_key_id,
        clients = request.clients.len(),
        loans = request.loans.len(),
        "Import started"
    );

    Ok(Json(import_service::import(&pool, &settings, request).await?))
}

/// Delete imported loans, payments, applications and client profiles.
///
/// # Response (200)
///
/// ```json
/// { "payments": 143, "loans": 10, "applications": 10, "profiles": 12 }
/// ```
pub async fn purge_imports(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<PurgeReport>, AppError> {
    auth.require_staff()?;

    Ok(Json(import_service::purge(&pool).await?))
}
