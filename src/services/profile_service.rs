//! Borrower profile management.

use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        pagination::{PageResponse, SearchQuery},
        profile::{CreateProfileRequest, Profile, ProfileUpdate},
    },
};

/// Create a profile.
///
/// # Errors
///
/// - `InvalidRequest`: full name is blank
/// - `Database`: Database error occurred
pub async fn create_profile(
    pool: &DbPool,
    request: CreateProfileRequest,
) -> Result<Profile, AppError> {
    let full_name = request.full_name.trim();
    if full_name.is_empty() {
        return Err(AppError::InvalidRequest(
            "Full name is required".to_string(),
        ));
    }

    let profile = sqlx::query_as::<_, Profile>(
        r#"
        INSERT INTO profiles (
            full_name, email, phone_number, address, bank_account, occupation,
            id1_type, id1_number, id2_type, id2_number, vehicle_number_plate, taxi_company
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(full_name)
    .bind(request.email)
    .bind(request.phone_number)
    .bind(request.address)
    .bind(request.bank_account)
    .bind(request.occupation)
    .bind(request.id1_type)
    .bind(request.id1_number)
    .bind(request.id2_type)
    .bind(request.id2_number)
    .bind(request.vehicle_number_plate)
    .bind(request.taxi_company)
    .fetch_one(pool)
    .await?;

    tracing::info!(profile_id = %profile.id, "Profile created");

    Ok(profile)
}

pub async fn get_profile(pool: &DbPool, profile_id: Uuid) -> Result<Profile, AppError> {
    sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
        .bind(profile_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::ProfileNotFound)
}

/// List profiles, newest first, optionally matching name or client number.
pub async fn list_profiles(
    pool: &DbPool,
    query: &SearchQuery,
) -> Result<PageResponse<Profile>, AppError> {
    let page = query.page();
    let pattern = query.pattern();

    let profiles = sqlx::query_as::<_, Profile>(
        r#"
        SELECT * FROM profiles
        WHERE $1::TEXT IS NULL OR full_name ILIKE $1 OR client_no ILIKE $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(&pattern)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM profiles WHERE $1::TEXT IS NULL OR full_name ILIKE $1 OR client_no ILIKE $1",
    )
    .bind(&pattern)
    .fetch_one(pool)
    .await?;

    Ok(PageResponse::new(profiles, page, total))
}

/// Apply a borrower's contact-detail update inside an open transaction.
///
/// Fields left as `None` keep their stored value.
pub async fn apply_profile_update(
    tx: &mut Transaction<'_, Postgres>,
    profile_id: Uuid,
    update: &ProfileUpdate,
) -> Result<(), AppError> {
    if update.is_empty() {
        return Ok(());
    }

    let updated = sqlx::query(
        r#"
        UPDATE profiles
        SET full_name = COALESCE($2, full_name),
            phone_number = COALESCE($3, phone_number),
            address = COALESCE($4, address),
            bank_account = COALESCE($5, bank_account),
            taxi_company = COALESCE($6, taxi_company),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(profile_id)
    .bind(&update.full_name)
    .bind(&update.phone_number)
    .bind(&update.address)
    .bind(&update.bank_account)
    .bind(&update.taxi_company)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(AppError::ProfileNotFound);
    }

    Ok(())
}
