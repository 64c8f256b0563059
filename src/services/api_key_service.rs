//! API key issuance.
//!
//! Keys are 32 random bytes, hex encoded. Only the SHA-256 hash is stored;
//! the plaintext is returned once to whoever issued it.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::hash_api_key,
    models::{
        api_key::{ApiKey, IssuedApiKeyResponse, Role},
        profile::Profile,
    },
};

/// Generate a new plaintext API key (64 hex characters).
fn generate_api_key() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Issue a borrower key bound to a profile.
///
/// # Errors
///
/// - `ProfileNotFound`: no such profile
/// - `Database`: Database error occurred
pub async fn issue_borrower_key(
    pool: &DbPool,
    profile_id: Uuid,
    label: Option<String>,
) -> Result<IssuedApiKeyResponse, AppError> {
    let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
        .bind(profile_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::ProfileNotFound)?;

    let api_key = generate_api_key();

    let record = sqlx::query_as::<_, ApiKey>(
        r#"
        INSERT INTO api_keys (key_hash, label, role, profile_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id, key_hash, label, role, profile_id, created_at, is_active
        "#,
    )
    .bind(hash_api_key(&api_key))
    .bind(label.unwrap_or(profile.full_name))
    .bind(Role::Borrower.as_str())
    .bind(profile.id)
    .fetch_one(pool)
    .await?;

    tracing::info!(api_key_id = %record.id, profile_id = %profile.id, "Issued borrower API key");

    Ok(IssuedApiKeyResponse::new(record, api_key))
}

/// Make sure a staff key with this plaintext exists and is active.
///
/// Used at startup to seed the first staff key from configuration.
pub async fn ensure_staff_key(pool: &DbPool, api_key: &str, label: &str) -> Result<(), AppError> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO api_keys (key_hash, label, role)
        VALUES ($1, $2, $3)
        ON CONFLICT (key_hash) DO UPDATE SET is_active = true
        "#,
    )
    .bind(hash_api_key(api_key))
    .bind(label)
    .bind(Role::Staff.as_str())
    .execute(pool)
    .await?
    .rows_affected();

    tracing::info!(rows = inserted, "Bootstrap staff API key ensured");

    Ok(())
}
