//! Profile and API key HTTP handlers.
//!
//! - POST /api/v1/profiles - Create a borrower profile (staff)
//! - GET /api/v1/profiles - Search profiles (staff)
//! - GET /api/v1/profiles/{id} - Get a profile
//! - POST /api/v1/profiles/{id}/api-keys - Issue a borrower API key (staff)
//! - GET /api/v1/me - The caller's own profile

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        api_key::{IssueApiKeyRequest, IssuedApiKeyResponse},
        pagination::{PageResponse, SearchQuery},
        profile::{CreateProfileRequest, Profile},
    },
    services::{api_key_service, profile_service},
};

/// Create a borrower profile.
///
/// # Request Body
///
/// ```json
/// {
///   "full_name": "Tama Ngata",
///   "phone_number": "021 555 0192",
///   "taxi_company": "Blue Bubble"
/// }
/// ```
///
/// # Response (201)
///
/// The stored profile.
pub async fn create_profile(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateProfileRequest>,
) -> Result<(StatusCode, Json<Profile>), AppError> {
    auth.require_staff()?;

    let profile = profile_service::create_profile(&pool, request).await?;

    Ok((StatusCode::CREATED, Json(profile)))
}

/// Search profiles by name or client number.
///
/// # Endpoint
///
/// `GET /api/v1/profiles?search=ngata&page=1&per_page=20`
pub async fn list_profiles(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<PageResponse<Profile>>, AppError> {
    auth.require_staff()?;

    Ok(Json(profile_service::list_profiles(&pool, &query).await?))
}

/// Get a profile. Borrowers can only see their own.
pub async fn get_profile(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(profile_id): Path<Uuid>,
) -> Result<Json<Profile>, AppError> {
    if let Some(own) = auth.visible_profile()? {
        if own != profile_id {
            return Err(AppError::ProfileNotFound);
        }
    }

    Ok(Json(profile_service::get_profile(&pool, profile_id).await?))
}

/// Get the profile behind the calling API key.
///
/// # Endpoint
///
/// `GET /api/v1/me`
pub async fn get_me(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Profile>, AppError> {
    let profile_id = auth.own_profile()?;

    Ok(Json(profile_service::get_profile(&pool, profile_id).await?))
}

/// Issue an API key for a borrower.
///
/// # Endpoint
///
/// `POST /api/v1/profiles/{id}/api-keys` with body `{}` or `{"label": "..."}`
///
/// # Response (201)
///
/// Includes the plaintext `api_key`. It cannot be retrieved again.
pub async fn issue_api_key(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(profile_id): Path<Uuid>,
    Json(request): Json<IssueApiKeyRequest>,
) -> Result<(StatusCode, Json<IssuedApiKeyResponse>), AppError> {
    auth.require_staff()?;

    let issued = api_key_service::issue_borrower_key(&pool, profile_id, request.label).await?;

    Ok((StatusCode::CREATED, Json(issued)))
}
