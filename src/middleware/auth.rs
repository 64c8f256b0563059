//! API key authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the API key from the Authorization header
//! 2. Hash it and verify it exists in the database
//! 3. Inject authentication context (role and profile) into the request
//! 4. Reject unauthorized requests with HTTP 401

use crate::{
    db::DbPool,
    error::AppError,
    models::api_key::{ApiKey, Role},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Authentication context attached to authenticated requests.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// ID of the authenticated API key
    pub api_key_id: Uuid,

    pub role: Role,

    /// Profile the key belongs to; always set for borrowers
    pub profile_id: Option<Uuid>,
}

impl AuthContext {
    pub fn is_staff(&self) -> bool {
        self.role == Role::Staff
    }

    /// Reject anyone but staff with 403.
    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    /// Profile filter for read queries: `None` for staff (see everything),
    /// the caller's own profile for borrowers.
    pub fn visible_profile(&self) -> Result<Option<Uuid>, AppError> {
        match self.role {
            Role::Staff => Ok(None),
            Role::Borrower => self.profile_id.map(Some).ok_or(AppError::Forbidden),
        }
    }

    /// The caller's own profile; 403 for keys without one.
    pub fn own_profile(&self) -> Result<Uuid, AppError> {
        self.profile_id.ok_or(AppError::Forbidden)
    }
}

/// Hash a plaintext API key the way it is stored: SHA-256, lowercase hex.
pub fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// API key authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <key>` header from request
/// 2. Hash the `<key>` using SHA-256
/// 3. Query database for matching hash where `is_active = true`
/// 4. If found: inject `AuthContext` into request, call next handler
/// 5. If not found: return 401 Unauthorized error
pub async fn auth_middleware(
    State(pool): State<DbPool>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let api_key = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::InvalidApiKey)?;

    let key_hash = hash_api_key(api_key);

    let record = sqlx::query_as::<_, ApiKey>(
        "SELECT id, key_hash, label, role, profile_id, created_at, is_active
         FROM api_keys
         WHERE key_hash = $1 AND is_active = true",
    )
    .bind(&key_hash)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::InvalidApiKey)?;

    tracing::debug!(api_key_id = %record.id, role = record.role.as_str(), "Authenticated");

    request.extensions_mut().insert(AuthContext {
        api_key_id: record.id,
        role: record.role,
        profile_id: record.profile_id,
    });

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(role: Role, profile_id: Option<Uuid>) -> AuthContext {
        AuthContext {
            api_key_id: Uuid::new_v4(),
            role,
            profile_id,
        }
    }

    #[test]
    fn test_hash_matches_known_digest() {
        assert_eq!(
            hash_api_key("test"),
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn test_staff_sees_everything() {
        let staff = context(Role::Staff, None);
        assert!(staff.require_staff().is_ok());
        assert_eq!(staff.visible_profile().unwrap(), None);
    }

    #[test]
    fn test_borrower_scoped_to_own_profile() {
        let profile_id = Uuid::new_v4();
        let borrower = context(Role::Borrower, Some(profile_id));

        assert!(matches!(borrower.require_staff(), Err(AppError::Forbidden)));
        assert_eq!(borrower.visible_profile().unwrap(), Some(profile_id));
        assert_eq!(borrower.own_profile().unwrap(), profile_id);
    }

    #[test]
    fn test_borrower_without_profile_is_forbidden() {
        let borrower = context(Role::Borrower, None);
        assert!(matches!(borrower.visible_profile(), Err(AppError::Forbidden)));
    }
}
