//! API Key model for authentication.
//!
//! API keys authenticate both staff and borrowers. They are stored in the
//! database as SHA-256 hashes; the plaintext is shown once, when issued.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnknownVariant;

/// What an API key is allowed to do.
///
/// - `Staff`: review, fund, record payments, import; sees every record
/// - `Borrower`: submit and cancel own applications; sees own records only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Staff,
    Borrower,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Staff => "staff",
            Role::Borrower => "borrower",
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "staff" => Ok(Role::Staff),
            "borrower" => Ok(Role::Borrower),
            _ => Err(UnknownVariant { kind: "role", value }),
        }
    }
}

/// Represents an API key record from the database.
///
/// # Database Table
///
/// Maps to the `api_keys` table. Borrower keys always reference a profile;
/// staff keys usually don't.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKey {
    pub id: Uuid,

    /// SHA-256 hash of the actual API key (64 hex characters)
    pub key_hash: String,

    /// Human-readable label, e.g. the staff member's name
    pub label: String,

    #[sqlx(try_from = "String")]
    pub role: Role,

    pub profile_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,

    /// Inactive keys are rejected during authentication.
    pub is_active: bool,
}

/// Request body for issuing a borrower key.
#[derive(Debug, Default, Deserialize)]
pub struct IssueApiKeyRequest {
    /// Defaults to the profile's full name
    pub label: Option<String>,
}

/// Response when a key is issued.
///
/// The `api_key` field is the only time the plaintext key is returned.
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "label": "Tama Ngata",
///   "role": "borrower",
///   "profile_id": "660e8400-e29b-41d4-a716-446655440001",
///   "api_key": "9f86d081884c7d65...",
///   "created_at": "2025-03-01T10:00:00Z"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct IssuedApiKeyResponse {
    pub id: Uuid,
    pub label: String,
    pub role: Role,
    pub profile_id: Option<Uuid>,
    pub api_key: String,
    pub created_at: DateTime<Utc>,
}

impl IssuedApiKeyResponse {
    pub fn new(record: ApiKey, api_key: String) -> Self {
        Self {
            id: record.id,
            label: record.label,
            role: record.role,
            profile_id: record.profile_id,
            api_key,
            created_at: record.created_at,
        }
    }
}
